use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use kanji_battle::battle::{self, Action, GameState, StagePhase, StageReport};
use kanji_battle::input::{parse_command, Command};
use kanji_battle::store::{
    AchievementSink, FileStore, KeyValueStore, MemoryAchievements, MemoryStore, StoreAchievements,
};
use kanji_battle::{BattleConfig, BattleError, Catalog};

/// 漢字よみバトル (terminal front end)
#[derive(Parser, Debug)]
#[command(name = "kanji-battle", version, about)]
struct Cli {
    /// Catalog JSON with `kanji`, `enemies` and `stages`.
    #[arg(long)]
    catalog: PathBuf,
    /// Stage id to play (e.g. `s1`, `bonus_g1`).
    #[arg(long)]
    stage: String,
    /// Balance overrides (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Progress file. Achievements go next to it. Nothing is saved when omitted.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Fixed RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

fn print_new_lines(state: &GameState, shown: &mut usize) {
    if let Some(enc) = &state.encounter {
        for line in enc.log.iter().skip(*shown) {
            println!("  {line}");
        }
        *shown = enc.log.len();
    }
}

fn status_line(state: &GameState) -> String {
    let p = &state.player;
    let mut s = format!("Lv{} HP {}/{} かいふく{}", p.level, p.hp, p.max_hp, p.heal_count);
    if let Some(e) = state.encounter.as_ref().and_then(|enc| enc.current_enemy()) {
        s.push_str(&format!(" | {} HP {}/{}", e.name, e.hp, e.max_hp));
        if e.is_shielded() {
            s.push_str(&format!(" 盾{}", e.shield_hp));
        }
    }
    s
}

fn print_report(report: &StageReport) {
    println!();
    println!(
        "== {} {} ==",
        report.stage_id,
        if report.cleared { "クリア" } else { "しっぱい" }
    );
    println!(
        "たおした敵 {} / せいかいりつ {:.0}% / のこりHP {:.0}%",
        report.enemies_defeated, report.accuracy_pct, report.remaining_hp_pct
    );
    if let Some(bonus) = &report.bonus {
        println!(
            "スコア {} ランク {:?} (x{}) 基本{} 初回{}",
            bonus.score, bonus.rank, bonus.multiplier, bonus.base_xp, bonus.first_clear_bonus
        );
        let tp = &bonus.title_progress;
        match tp.next_threshold {
            Some(next) => println!("称号カウント {} / 次 {}", tp.count, next),
            None => println!("称号カウント {} (すべて解放)", tp.count),
        }
        for title in &tp.titles_unlocked {
            println!("称号を手に入れた！ {title}");
        }
    }
    if report.xp_awarded > 0 {
        println!("{}の経験値を獲得した！", report.xp_awarded);
    }
    if let Some(lu) = report.level_up.filter(|lu| lu.leveled_up) {
        println!("レベルが {} にあがった！", lu.new_level);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => BattleConfig::load(path)?,
        None => BattleConfig::default(),
    };
    let catalog = Catalog::load(&cli.catalog, &config)?;
    info!(
        "catalog: {} kanji, {} stages",
        catalog.all_kanji().len(),
        catalog.stages().len()
    );

    let mut store: Box<dyn KeyValueStore>;
    let mut sink: Box<dyn AchievementSink>;
    match &cli.save {
        Some(path) => {
            let save = FileStore::open(path)?;
            let achievements = FileStore::open(&path.with_extension("achievements.json"))?;
            info!(
                "save: {}, achievements: {}",
                save.path().display(),
                achievements.path().display()
            );
            store = Box::new(save);
            sink = Box::new(StoreAchievements::new(achievements));
        }
        None => {
            store = Box::new(MemoryStore::new());
            sink = Box::new(MemoryAchievements::new());
        }
    }

    let mut state = match cli.seed {
        Some(seed) => GameState::with_seed(config, catalog, seed),
        None => GameState::new(config, catalog),
    };
    battle::start_stage(&mut state, &cli.stage)?;

    let mut shown = 0;
    print_new_lines(&state, &mut shown);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let phase = state.encounter.as_ref().map(|e| e.phase);
        if phase != Some(StagePhase::InProgress) {
            break;
        }
        print!("[{}] > ", status_line(&state));
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            battle::leave_stage(&mut state);
            return Ok(());
        };
        let result = match parse_command(&line?) {
            Command::Attack(answer) => {
                battle::submit_answer(&mut state, &answer, Action::Attack).map(|_| ())
            }
            Command::Heal(answer) => battle::submit_answer(&mut state, &answer, Action::Heal).map(|_| ()),
            Command::Hint => battle::cycle_hint(&mut state).map(|_| ()),
            Command::Quit => {
                battle::leave_stage(&mut state);
                println!("ステージをはなれた。");
                return Ok(());
            }
            Command::Empty => continue,
            Command::Unknown(word) => {
                println!("しらないコマンド: :{word}  (:heal / :hint / :quit)");
                continue;
            }
        };
        match result {
            Ok(()) => {}
            Err(BattleError::NoHealsLeft) => println!("回復はもう使えません！"),
            Err(e) => return Err(e.into()),
        }

        battle::run_pending(&mut state)?;
        print_new_lines(&state, &mut shown);
    }

    let report = battle::finish_stage(&mut state, store.as_mut(), sink.as_mut())?;
    print_report(&report);
    println!("マスターかんじ {} こ", state.progress.mastered_count());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
