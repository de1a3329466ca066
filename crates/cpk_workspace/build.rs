fn main() {
    // This is a stub build script.
}
