use std::time::Duration;

use anyhow::{bail, Result};
use blog_generator::jobs::JobState;
use blog_generator::submitter::BlogClient;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the blog generator
    #[arg(short, long, env = "BLOG_GENERATOR_URL", default_value = "http://127.0.0.1:25566")]
    pub url: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a topic and report whether the request was accepted
    Submit {
        /// Topic of the blog
        topic: String,
    },
    /// Show the most recently stored blog
    Latest,
    /// Send a topic as a tracked job
    Generate {
        /// Topic of the blog
        topic: String,

        /// Poll until the job finishes and print the blog
        #[clap(short, long)]
        wait: bool,

        /// Seconds to wait for the job before giving up
        #[clap(long, default_value_t = 330)]
        timeout: u64,
    },
    /// Show the state of a tracked job
    Status {
        /// Job id returned by `generate`
        id: String,
    },
    /// Print the blog of a finished job
    Fetch {
        /// Job id returned by `generate`
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = BlogClient::new(&args.url)?;

    match args.cmd {
        Commands::Submit { topic } => {
            if client.submit(&topic).await? {
                println!("Blog generation request sent! Please wait a few moments.");
            } else {
                bail!("Failed to send request, check the service address");
            }
        }
        Commands::Latest => match client.latest().await? {
            Some(latest) => println!("{} ({})\n\n{}", latest.key, latest.last_modified, latest.content),
            None => println!("No blog found yet. Try generating one first!"),
        },
        Commands::Generate {
            topic,
            wait,
            timeout,
        } => {
            let job = client.generate(&topic).await?;
            println!("Job {} accepted, the blog will be stored at {}", job.id, job.artifact_key);
            if wait {
                let job = client
                    .wait_for(
                        job.id.as_str(),
                        Duration::from_secs(2),
                        Duration::from_secs(timeout),
                    )
                    .await?;
                match job.state {
                    JobState::Complete => println!("\n{}", client.content(job.id.as_str()).await?),
                    _ => bail!(
                        "Job {} failed: {}",
                        job.id,
                        job.failure.unwrap_or_default()
                    ),
                }
            }
        }
        Commands::Status { id } => {
            let job = client.status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Fetch { id } => println!("{}", client.content(&id).await?),
    }
    Ok(())
}
