use super::Parser;
use crate::domain_model::UserId;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    /// Session user; a random id is used when omitted.
    #[arg(long)]
    pub user: Option<UserId>,

    /// Resolve the relationship to these users after the initial refresh.
    #[arg(long = "status-of")]
    pub status_of: Vec<UserId>,
}
