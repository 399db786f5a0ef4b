fn main() {
    querychat_lib::run()
}
