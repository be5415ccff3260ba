use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    solution_pairs::apps::run_corpus_summary(std::env::args().skip(1))
}
