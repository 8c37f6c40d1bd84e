pub mod server;

/// What the CLI resolved to run.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}
