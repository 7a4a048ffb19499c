fn main() {
    lumen::run();
}
