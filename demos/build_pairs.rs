use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    solution_pairs::apps::run_build_pairs(std::env::args().skip(1))
}
