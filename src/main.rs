mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod tidy;

fn main() {
    env_loader::load_dotenv();
    logging::init_tracing();

    if let Err(err) = cli::run() {
        eprintln!("error: {}", error::describe(&err));
        std::process::exit(1);
    }
}
