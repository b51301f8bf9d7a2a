fn main() {
    polyfm::runtime::start();
}
