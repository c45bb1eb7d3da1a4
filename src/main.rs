use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use giftie::logging::{self, LogLevel};
use giftie::{
    FriendDirectory, Fulfillment, GiftError, HistoryLedger, HttpGiftService, NewFriend, Price,
    ServiceConfig, Settings, SuggestionWorkflow,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// `giftie`: suggest, remember and send gifts for your friends
#[derive(Parser, Debug)]
#[command(name = "giftie", version, about = "Gift suggestion assistant")]
struct Cli {
    /// Path to the settings file
    #[arg(long, default_value = "giftie.toml")]
    config: PathBuf,

    /// Base URL of the gift service, overriding the settings file
    #[arg(long, env = "GIFTIE_BASE_URL")]
    base_url: Option<String>,

    /// Logging verbosity level
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List friends
    Friends,
    /// Register a friend with the service
    AddFriend {
        #[arg(long)]
        name: String,
        /// Birthday as YYYY-MM-DD
        #[arg(long)]
        birthday: NaiveDate,
        #[arg(long)]
        sentiment: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Friends with a birthday coming up
    Upcoming {
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Ask for a gift suggestion and decide on it
    Suggest {
        name: String,
        #[arg(long)]
        sentiment: Option<String>,
        /// Decide without prompting
        #[arg(long)]
        decision: Option<Decision>,
    },
    /// Show accepted suggestions for a friend
    History { name: String },
    /// Start a checkout for a gift
    Order {
        gift: String,
        recipient: String,
        /// Price such as 5.00; defaults to the configured price
        #[arg(long)]
        price: Option<Price>,
    },
    /// Render a postcard, optionally emailing it
    Postcard {
        gift: String,
        recipient: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Email a previously rendered postcard
    EmailPostcard {
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Decision {
    Accept,
    Reject,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<GiftError>() {
                Some(g) => eprintln!("Error: {}", g.reason()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(&cli.config).await?;
    if let Some(url) = &cli.base_url {
        let timeout = settings.service.timeout;
        settings.service = ServiceConfig::parse(url)?;
        settings.service.timeout = timeout;
    }
    debug!(base_url = %settings.service.base_url, "using gift service");
    let service = Arc::new(HttpGiftService::new(settings.service.clone())?);
    let defaults = settings.defaults;

    match cli.command {
        Command::Friends => {
            let friends = FriendDirectory::new(service).list().await?;
            if friends.is_empty() {
                println!("No friends found.");
            }
            for f in friends {
                println!("{}\t{}", f.name, f.birthday);
            }
        }
        Command::AddFriend {
            name,
            birthday,
            sentiment,
            email,
        } => {
            let friend = FriendDirectory::new(service)
                .add(NewFriend {
                    name,
                    birthday,
                    sentiment: sentiment.unwrap_or(defaults.sentiment),
                    email,
                })
                .await?;
            println!("{} added successfully!", friend.name);
        }
        Command::Upcoming { days } => {
            let today = Local::now().date_naive();
            let soon = FriendDirectory::new(service)
                .upcoming_from_service(today, days)
                .await?;
            if soon.is_empty() {
                println!("No birthdays in the next {days} days.");
            }
            for u in soon {
                println!("{}\t{}\tin {} days", u.friend.name, u.next_birthday, u.days_until);
            }
        }
        Command::Suggest {
            name,
            sentiment,
            decision,
        } => {
            let sentiment = sentiment.unwrap_or(defaults.sentiment);
            suggest(service, &name, &sentiment, decision).await?;
        }
        Command::History { name } => {
            let view = HistoryLedger::new(service).view(&name).await?;
            if view.is_empty() {
                println!("No gift history found.");
            }
            for e in &view.entries {
                println!("{}\t{}", e.suggested_gift, e.sentiment);
            }
        }
        Command::Order {
            gift,
            recipient,
            price,
        } => {
            let price = price.unwrap_or(defaults.price);
            let res = Fulfillment::new(service)
                .order(&gift, &recipient, price)
                .await?;
            println!("{}", res.checkout_url);
        }
        Command::Postcard {
            gift,
            recipient,
            email,
        } => {
            let fulfillment = Fulfillment::new(service.clone());
            let card = fulfillment.generate_postcard(&gift, &recipient).await?;
            let link = service
                .resolve_url(&card.image_url)
                .with_context(|| format!("invalid image url {:?}", card.image_url))?;
            println!("{link}");
            if let Some(email) = email {
                fulfillment
                    .email_postcard(&card.image_url, &recipient, &email)
                    .await?;
                println!("Postcard was emailed successfully.");
            }
        }
        Command::EmailPostcard {
            image_url,
            name,
            email,
        } => {
            Fulfillment::new(service)
                .email_postcard(&image_url, &name, &email)
                .await?;
            println!("Postcard was emailed successfully.");
        }
    }
    Ok(())
}

async fn suggest(
    service: Arc<HttpGiftService>,
    name: &str,
    sentiment: &str,
    decision: Option<Decision>,
) -> anyhow::Result<()> {
    let friends = FriendDirectory::new(service.clone()).list().await?;
    let friend = friends
        .into_iter()
        .find(|f| f.name == name.trim())
        .with_context(|| format!("no friend named {name:?}"))?;

    let workflow = SuggestionWorkflow::new(service);
    let suggestion = workflow.request_suggestion(&friend, sentiment).await?;
    println!("Gift for {}: {}", suggestion.recipient, suggestion.suggested_gift);

    let accept = match decision {
        Some(d) => d == Decision::Accept,
        None => inquire::Confirm::new("Save this suggestion?")
            .with_default(true)
            .prompt()?,
    };
    if !accept {
        workflow.reject()?;
        println!("Suggestion discarded.");
        return Ok(());
    }

    loop {
        match workflow.accept().await {
            Ok(_) => {
                println!("Saved to gift history.");
                return Ok(());
            }
            Err(e) if decision.is_none() && e.is_retryable() => {
                eprintln!("Error: {}", e.reason());
                let retry = inquire::Confirm::new("Try saving again?")
                    .with_default(true)
                    .prompt()?;
                if !retry {
                    workflow.abandon()?;
                    println!("Suggestion discarded.");
                    return Ok(());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
