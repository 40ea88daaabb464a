use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ragent")]
#[command(about = "Ingest documents into a vector store and ask a retrieval agent about them", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Collection to use (overrides COLLECTION_NAME)")]
    pub collection: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(about = "Chunk, embed and store text files")]
    Ingest {
        #[arg(long, help = "Drop and recreate the collection first")]
        reset: bool,

        #[arg(required = true, help = "UTF-8 text files to ingest")]
        files: Vec<PathBuf>,
    },

    #[command(about = "Show the chunks most similar to a query")]
    Search {
        #[arg(help = "The search query")]
        query: String,

        #[arg(short, long, help = "Number of results (defaults to RETRIEVAL_K)")]
        k: Option<usize>,
    },

    #[command(about = "Answer a question from the top matches in one model call, with sources")]
    Query {
        #[arg(help = "The question to answer")]
        question: String,

        #[arg(short, long, help = "Number of chunks to retrieve (defaults to RETRIEVAL_K)")]
        k: Option<usize>,
    },

    #[command(about = "Ask the agent a question")]
    Ask {
        #[arg(help = "The question to answer")]
        question: String,

        #[arg(long, help = "Print the full transcript as JSON")]
        transcript: bool,
    },

    #[command(about = "Count the chunks stored in the collection")]
    Count,

    #[command(about = "Drop and recreate the collection")]
    Reset,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest_with_reset() {
        let cli = Cli::parse_from(["ragent", "ingest", "--reset", "a.txt", "b.md"]);
        match cli.command {
            Command::Ingest { reset, files } => {
                assert!(reset);
                assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.md")]);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn parses_search_k_and_global_collection() {
        let cli = Cli::parse_from(["ragent", "search", "revenue", "-k", "2", "--collection", "nike"]);
        assert_eq!(cli.collection.as_deref(), Some("nike"));
        assert!(matches!(cli.command, Command::Search { k: Some(2), .. }));
    }

    #[test]
    fn parses_query() {
        let cli = Cli::parse_from(["ragent", "query", "How do I install it?", "-k", "3"]);
        match cli.command {
            Command::Query { question, k } => {
                assert_eq!(question, "How do I install it?");
                assert_eq!(k, Some(3));
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn ingest_needs_files() {
        assert!(Cli::try_parse_from(["ragent", "ingest"]).is_err());
    }
}
