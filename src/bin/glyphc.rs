fn main() {
    std::process::exit(glyph::cli::run());
}
