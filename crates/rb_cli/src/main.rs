use clap::{Parser, ValueEnum};
use rb_cli::{prepare_config, Toolkit};
use rb_core::{Document, Error, MetadataFilter, Result};
use rb_loader::{ArticleLoader, DocBankLoader, DocumentLoader, LoaderOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

const PREVIEW_CHARS: usize = 160;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load, index and query article paragraphs", long_about = None)]
pub struct Cli {
    /// Vector store backend (memory, chroma). Defaults to VECTOR_BACKEND.
    #[arg(long)]
    storage: Option<String>,
    #[arg(long, default_value = "openai", help = "Model used for embeddings and answers. Available models: openai (default), dummy")]
    model: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One JSON file per article
    Article,
    /// DocBank: one directory of page files per article
    Docbank,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the effective configuration and any problems found
    Config,
    /// Load a directory without indexing and show what would be indexed
    Load {
        dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Article)]
        format: Format,
        #[arg(long)]
        recursive: bool,
        /// Number of paragraphs to preview
        #[arg(long, default_value_t = 3)]
        preview: usize,
    },
    /// Embed paragraphs and add them to the vector store
    Index {
        /// Defaults to JSON_DATA_DIR
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Article)]
        format: Format,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Show the paragraphs closest to a query
    Query {
        text: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Only search paragraphs of this article
        #[arg(long)]
        article: Option<String>,
    },
    /// Answer a question from the indexed paragraphs
    Ask {
        question: String,
        #[arg(long)]
        article: Option<String>,
    },
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut)
}

fn print_documents(documents: &[Document]) {
    for (i, doc) in documents.iter().enumerate() {
        let section = doc.metadata.get("section").and_then(|v| v.as_str()).unwrap_or("");
        println!("[{}] {} {}", i + 1, doc.id, section);
        println!("    {}", preview(&doc.text));
    }
}

fn docbank_documents(loaders: &[DocBankLoader]) -> impl Iterator<Item = Document> + '_ {
    loaders.iter().flat_map(|loader| match loader.load() {
        Ok(documents) => documents,
        Err(e) => {
            warn!("Skipping article {}: {}", loader.article_id(), e);
            Vec::new()
        }
    })
}

/// DocBank pages are always collected from the whole article directory,
/// so `--recursive` only applies to the article format.
fn check_recursive(format: Format, recursive: bool) -> Result<()> {
    if recursive && format == Format::Docbank {
        return Err(Error::Configuration(
            "--recursive cannot be used with --format docbank".to_string(),
        ));
    }
    Ok(())
}

fn load_preview(dir: &Path, format: Format, recursive: bool, count: usize) -> Result<()> {
    check_recursive(format, recursive)?;
    let config = prepare_config()?;
    let options = LoaderOptions::from_config(&config).with_recursive(recursive);

    let documents: Vec<Document> = match format {
        Format::Article => ArticleLoader::new(dir, options).load()?,
        Format::Docbank => {
            let loaders = DocBankLoader::corpus(dir, &options)?;
            docbank_documents(&loaders).collect()
        }
    };

    println!("Loaded {} paragraphs from {}", documents.len(), dir.display());
    print_documents(&documents[..count.min(documents.len())]);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let (dir, format, recursive, batch_size) = match cli.command {
        Commands::Config => {
            let config = prepare_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("OpenAI API key loaded: {}", config.has_api_key());
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in issues {
                println!("- {}", issue);
            }
            return Ok(());
        }
        Commands::Load {
            dir,
            format,
            recursive,
            preview,
        } => return load_preview(&dir, format, recursive, preview),
        Commands::Index {
            dir,
            format,
            recursive,
            batch_size,
        } => {
            check_recursive(format, recursive)?;
            (dir, format, recursive, batch_size)
        }
        Commands::Query { text, k, article } => {
            let toolkit = Toolkit::setup(cli.storage.as_deref(), &cli.model).await?;
            let filter = article.map(MetadataFilter::article);
            let k = k.unwrap_or(toolkit.retriever.default_k());
            let documents = toolkit.retriever.retrieve(&text, k, filter.as_ref()).await?;
            print_documents(&documents);
            return Ok(());
        }
        Commands::Ask { question, article } => {
            let toolkit = Toolkit::setup(cli.storage.as_deref(), &cli.model).await?;
            let filter = article.map(MetadataFilter::article);
            let answer = toolkit.qa_chain().answer(&question, filter.as_ref()).await?;
            println!("{}\n", answer.text);
            println!("Sources:");
            print_documents(&answer.sources);
            return Ok(());
        }
    };

    let toolkit = Toolkit::setup(cli.storage.as_deref(), &cli.model).await?;
    for line in toolkit.status_lines() {
        info!("{}", line);
    }

    let mut indexer = toolkit.indexer();
    if let Some(batch_size) = batch_size {
        indexer = indexer.with_batch_size(batch_size);
    }
    let report = match format {
        Format::Article => {
            let loader = toolkit.article_loader(dir.as_deref(), recursive);
            let documents = loader.lazy_load()?;
            indexer.index(documents).await?
        }
        Format::Docbank => {
            let loaders = toolkit.docbank_corpus(dir.as_deref())?;
            let documents = docbank_documents(&loaders);
            indexer.index(documents).await?
        }
    };
    println!("Indexed {} ({} documents in store)", report, toolkit.store.count().await?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Retrieval(msg)) => {
            eprintln!("Could not retrieve documents: {}", msg);
            eprintln!("Check that the vector store is reachable and run `rb index` before querying.");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
