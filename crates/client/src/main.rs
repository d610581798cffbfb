//! CLI for running a live player auction.
//!
//! This binary provides commands for:
//! - Creating an auction from a JSON setup file
//! - Driving rounds (lock a category, deal players, finalize)
//! - Placing bids on behalf of a team
//! - Querying the session, teams and bid history

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use auction_client::AuctionClient;
use auction_types::{AuctionSetup, SessionSnapshot};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for live player auctions")]
struct Cli {
    /// Auction server RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an auction from a setup file (JSON)
    CreateAuction {
        #[arg(long)]
        setup: PathBuf,
    },

    /// Move an auction from upcoming to live
    GoLive {
        #[arg(long)]
        auction_id: u64,
    },

    /// Lock a category and shuffle its players
    LockCategory {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        category: String,
    },

    /// Release the locked category
    UnlockCategory {
        #[arg(long)]
        auction_id: u64,
        /// Unlock even with unsold players left
        #[arg(long)]
        force: bool,
    },

    /// Open bidding on a specific player
    StartBidding {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        player_id: u64,
    },

    /// Resolve the current round and deal the next player
    NextPlayer {
        #[arg(long)]
        auction_id: u64,
    },

    /// Place a bid for a team
    Bid {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        team_id: u64,
        #[arg(long)]
        amount: u64,
        /// Player the bid is meant for
        #[arg(long)]
        player_id: Option<u64>,
    },

    /// Stop taking bids on the current player
    CloseRound {
        #[arg(long)]
        auction_id: u64,
    },

    /// Sell the current player to the highest bid
    Finalize {
        #[arg(long)]
        auction_id: u64,
    },

    /// Assign a player to a team at a fixed price
    ManualAssign {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        player_id: u64,
        #[arg(long)]
        team_id: u64,
        #[arg(long)]
        price: u64,
    },

    /// Leave the current player unsold
    Skip {
        #[arg(long)]
        auction_id: u64,
    },

    /// Complete a live auction
    Complete {
        #[arg(long)]
        auction_id: u64,
    },

    /// Cancel an auction
    Cancel {
        #[arg(long)]
        auction_id: u64,
    },

    /// Resolve expired rounds now
    Sweep,

    /// Set server time (manual clock only)
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },

    /// Advance server time (manual clock only)
    AdvanceTime {
        #[arg(long)]
        secs: u64,
    },

    /// Show the current round
    Session {
        #[arg(long)]
        auction_id: u64,
    },

    /// Show bids, optionally for one player
    Bids {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        player_id: Option<u64>,
    },

    /// Show the locked category's remaining order
    Queue {
        #[arg(long)]
        auction_id: u64,
    },

    /// Show team budgets and squads
    Teams {
        #[arg(long)]
        auction_id: u64,
    },

    /// Show the player pool
    Players {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        category: Option<String>,
    },

    /// List all auctions
    ListAuctions,
}

fn print_session(s: &SessionSnapshot) {
    println!("Auction {} ({:?}):", s.auction_id, s.status);
    println!("  Round: {:?}", s.round_state);
    if let Some(category) = &s.locked_category {
        println!("  Category: {} ({} left in queue)", category, s.queue_remaining);
    }
    match &s.current_player {
        Some(p) => println!("  Player: [{}] {}", p.player_id, p.name),
        None => println!("  Player: none"),
    }
    if let Some(bid) = &s.current_highest_bid {
        println!("  Highest: {} by {} ({})", bid.amount, bid.team_name, bid.owner);
    }
    if let Some(min) = s.next_minimum_bid {
        println!("  Next minimum: {}", min);
    }
    if let Some(deadline) = s.round_deadline {
        let left = deadline.saturating_sub(s.server_time);
        println!(
            "  Deadline: {} ({}s left{})",
            deadline,
            left,
            if s.deadline_elapsed { ", elapsed" } else { "" }
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = AuctionClient::connect(&cli.rpc)?;

    match cli.command {
        Commands::CreateAuction { setup } => {
            let raw = std::fs::read_to_string(&setup)
                .with_context(|| format!("reading {}", setup.display()))?;
            let setup: AuctionSetup = serde_json::from_str(&raw)?;
            let auction_id = client.create_auction(&setup).await?;
            info!("Created auction with ID: {}", auction_id);
            println!("Auction ID: {}", auction_id);
        }

        Commands::GoLive { auction_id } => {
            let session = client.go_live(auction_id).await?;
            print_session(&session);
        }

        Commands::LockCategory {
            auction_id,
            category,
        } => {
            let queue = client.lock_category(auction_id, &category).await?;
            println!(
                "Locked {} with {} players: {:?}",
                queue.category, queue.locked_total, queue.remaining
            );
        }

        Commands::UnlockCategory { auction_id, force } => {
            client.unlock_category(auction_id, force).await?;
            println!("Category unlocked");
        }

        Commands::StartBidding {
            auction_id,
            player_id,
        } => {
            let session = client.start_bidding(auction_id, player_id).await?;
            print_session(&session);
        }

        Commands::NextPlayer { auction_id } => {
            let session = client.next_player(auction_id).await?;
            print_session(&session);
        }

        Commands::Bid {
            auction_id,
            team_id,
            amount,
            player_id,
        } => {
            let bid = client
                .place_bid(auction_id, team_id, amount, player_id)
                .await?;
            println!("Bid accepted");
            println!("  Bid ID: {}", bid.bid_id);
            println!("  Player: {}", bid.player_id);
            println!("  Team: {} ({})", bid.team_name, bid.owner);
            println!("  Amount: {}", bid.amount);
        }

        Commands::CloseRound { auction_id } => {
            let session = client.close_round(auction_id).await?;
            print_session(&session);
        }

        Commands::Finalize { auction_id } => {
            let a = client.finalize_bid(auction_id).await?;
            println!("Player {} sold to team {} for {}", a.player_id, a.team_id, a.price);
        }

        Commands::ManualAssign {
            auction_id,
            player_id,
            team_id,
            price,
        } => {
            let a = client
                .manual_assign(auction_id, player_id, team_id, price)
                .await?;
            println!("Player {} assigned to team {} for {}", a.player_id, a.team_id, a.price);
        }

        Commands::Skip { auction_id } => {
            let player_id = client.skip_player(auction_id).await?;
            println!("Player {} unsold", player_id);
        }

        Commands::Complete { auction_id } => {
            client.complete_auction(auction_id).await?;
            println!("Auction {} completed", auction_id);
        }

        Commands::Cancel { auction_id } => {
            client.cancel_auction(auction_id).await?;
            println!("Auction {} cancelled", auction_id);
        }

        Commands::Sweep => {
            let resolved = client.sweep().await?;
            if resolved.is_empty() {
                println!("No expired rounds");
            }
            for r in resolved {
                println!("  [{}] {:?}", r.auction_id, r.outcome);
            }
        }

        Commands::SetTimestamp { timestamp } => {
            client.set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::AdvanceTime { secs } => {
            let now = client.advance_time(secs).await?;
            println!("Server time: {}", now);
        }

        Commands::Session { auction_id } => {
            let session = client.get_session(auction_id).await?;
            print_session(&session);
        }

        Commands::Bids {
            auction_id,
            player_id,
        } => {
            let bids = client.get_bid_history(auction_id, player_id).await?;
            if bids.is_empty() {
                println!("No bids");
            }
            for b in bids {
                println!(
                    "  #{} player {} {} by {}{}",
                    b.bid_id,
                    b.player_id,
                    b.amount,
                    b.team_name,
                    if b.is_winning { " (winning)" } else { "" }
                );
            }
        }

        Commands::Queue { auction_id } => match client.get_queue(auction_id).await? {
            Some(q) => println!(
                "{}: {} of {} left {:?}",
                q.category,
                q.remaining.len(),
                q.locked_total,
                q.remaining
            ),
            None => println!("No category locked"),
        },

        Commands::Teams { auction_id } => {
            for t in client.get_teams(auction_id).await? {
                println!(
                    "  [{}] {} ({}): {} spent, {} left, {} players",
                    t.team_id, t.name, t.owner, t.points_spent, t.points_left, t.squad_size
                );
            }
        }

        Commands::Players {
            auction_id,
            category,
        } => {
            for p in client.get_players(auction_id, category.as_deref()).await? {
                let status = match (p.team_id, p.bid_price) {
                    (Some(team), Some(price)) => format!("sold to {} for {}", team, price),
                    _ => "available".to_string(),
                };
                println!(
                    "  [{}] {} {} - {}",
                    p.player_id,
                    p.name,
                    p.effective_category().unwrap_or("-"),
                    status
                );
            }
        }

        Commands::ListAuctions => {
            let auctions = client.list_auctions().await?;
            if auctions.is_empty() {
                println!("No auctions found");
            } else {
                println!("Auctions:");
                for a in auctions {
                    println!(
                        "  [{}] {} - {:?} ({}/{} sold)",
                        a.auction_id, a.name, a.status, a.players_sold, a.players_total
                    );
                }
            }
        }
    }

    Ok(())
}
