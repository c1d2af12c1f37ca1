use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tok::cli::main()
}
