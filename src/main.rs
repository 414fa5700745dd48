use std::process;

fn main() {
    if let Err(err) = budget_drafts::run() {
        eprintln!("Error: {}", err);
        for cause in err.iter().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        process::exit(1);
    }
}
