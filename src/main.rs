use gitsnap::ui::output;

fn main() {
    if let Err(err) = gitsnap::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
