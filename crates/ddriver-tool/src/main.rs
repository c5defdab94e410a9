fn main() {
    if let Err(err) = ddriver_tool::run_from(std::env::args_os()) {
        eprintln!("ddriver-tool: {err}");
        std::process::exit(1);
    }
}
