use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    charchat::cli::main()
}
