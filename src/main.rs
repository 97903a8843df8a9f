mod audio;
mod config;
mod error;
mod library;
mod player;
mod playlist;
mod runtime;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
