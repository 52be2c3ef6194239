use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{HttpGameRpc, Phase, Screen, SessionController, SessionEvent, ViewModel};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the game service, e.g. http://localhost:8080
    #[arg(long)]
    server_url: String,
    /// Display name to join the game with
    #[arg(long)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let rpc = Arc::new(HttpGameRpc::new(args.server_url));
    let controller = SessionController::new(rpc);

    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            render(&event);
        }
    });

    controller.join(&args.name).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input == "quit" || input == "q" {
            break;
        }
        match controller.phase().await {
            Phase::InLobby => controller.start_game().await?,
            Phase::AwaitingAnswer => {
                let Some(option) = pick_option(&controller, input).await else {
                    println!("Pick one of the listed option numbers.");
                    continue;
                };
                if let Err(err) = controller.submit_answer(&option).await {
                    eprintln!("{err}");
                }
            }
            Phase::FetchingQuestion => {
                if let Err(err) = controller.refetch_question().await {
                    eprintln!("{err}");
                }
            }
            Phase::LeaderboardLoading | Phase::LeaderboardReady => {
                if input.is_empty() {
                    break;
                }
                if let Err(err) = controller.refresh_leaderboard().await {
                    eprintln!("{err}");
                }
            }
            _ => {}
        }
    }

    controller.reset().await;
    Ok(())
}

async fn pick_option(controller: &Arc<SessionController>, input: &str) -> Option<String> {
    let index: usize = input.parse().ok()?;
    let vm = controller.view_model().await;
    let options = &vm.question.as_ref()?.options;
    options.get(index.checked_sub(1)?).cloned()
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::Navigate(Screen::Lobby) => {
            println!("Joined the lobby. Press Enter to start the game.");
        }
        SessionEvent::Navigate(Screen::Leaderboard) => {
            println!("\nNo more questions - final standings:");
        }
        SessionEvent::ViewModel(vm) => render_view_model(vm),
    }
}

fn render_view_model(vm: &ViewModel) {
    if let Some(error) = &vm.error {
        eprintln!("error: {error}");
        return;
    }
    if vm.loading {
        return;
    }
    match vm.phase {
        Phase::AwaitingAnswer => {
            if let Some(question) = &vm.question {
                println!("\n{}", question.text);
                for (index, option) in question.options.iter().enumerate() {
                    println!("  {}. {option}", index + 1);
                }
                println!("Answer with the option number.");
            }
        }
        Phase::ShowingResult => {
            if let Some(result) = &vm.result {
                let verdict = if result.correct { "Correct!" } else { "Wrong." };
                println!(
                    "{verdict} +{} points - {}",
                    result.points_awarded, result.explanation
                );
            }
        }
        Phase::LeaderboardReady => {
            for entry in &vm.leaderboard {
                println!("{:>3}. {} - {} pts", entry.rank, entry.player_name, entry.score);
            }
            println!("Press Enter to exit, or type anything to refresh.");
        }
        _ => {}
    }
}
