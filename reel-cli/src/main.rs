fn main() {
    reel_cli::run()
}
