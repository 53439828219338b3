//! Player-versus-creature balance simulation.
//!
//! Builds a player at a given level with the standard starter gear, pits it
//! against a dummy creature with the given stats, and reports how lopsided the
//! results are.

use std::io::{self, Write};

use engine::combat::{
    simulate, LevelCurve, LogarithmicFormula, RoundOutcome, RoundResult, SimulationReport,
    DEFAULT_TURN_LIMIT,
};
use engine::entity::{ItemTemplate, RpEntity, PLAYER_SLOTS};
use engine::{EntityId, ZoneId};
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub const DEFAULT_ROUNDS: u32 = 1000;
pub const DEFAULT_THRESHOLD: u32 = 5;

const SIMULATION_ZONE: &str = "simulation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    pub level: u32,
    pub hp: u32,
    pub atk: u32,
    pub def: u32,
    pub rounds: u32,
    pub threshold: u32,
    pub seed: Option<u64>,
    pub barehanded: bool,
    pub equipsame: bool,
    pub noboost: bool,
    pub fair: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Help,
    Simulate(SimulationOptions),
}

#[derive(Default)]
struct RawArgs {
    level: Option<i64>,
    hp: Option<i64>,
    atk: Option<i64>,
    def: Option<i64>,
    rounds: Option<i64>,
    threshold: Option<i64>,
    seed: Option<i64>,
    barehanded: bool,
    equipsame: bool,
    noboost: bool,
    fair: bool,
}

/// Flags are matched case-insensitively. The first problem found is returned as
/// the message shown after `ERROR:`.
pub fn parse_args(args: &[String]) -> Result<CliAction, String> {
    let mut raw = RawArgs::default();
    let mut unknown = Vec::new();
    let mut index = 0usize;

    while index < args.len() {
        let flag = args[index].to_lowercase();
        let target = match flag.as_str() {
            "--help" | "-h" | "help" => return Ok(CliAction::Help),
            "--lvl" | "--level" => Some(("lvl", &mut raw.level)),
            "--hp" => Some(("hp", &mut raw.hp)),
            "--atk" | "--attack" => Some(("atk", &mut raw.atk)),
            "--def" | "--defense" => Some(("def", &mut raw.def)),
            "--rounds" => Some(("rounds", &mut raw.rounds)),
            "--threshold" => Some(("threshold", &mut raw.threshold)),
            "--seed" => Some(("seed", &mut raw.seed)),
            "--barehanded" => {
                raw.barehanded = true;
                None
            }
            "--equipsame" => {
                raw.equipsame = true;
                None
            }
            "--noboost" => {
                raw.noboost = true;
                None
            }
            "--fair" => {
                raw.fair = true;
                None
            }
            _ => {
                unknown.push(flag.clone());
                None
            }
        };

        if let Some((name, slot)) = target {
            let value = args
                .get(index + 1)
                .ok_or_else(|| format!("{name} argument requires value"))?;
            let parsed = value
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("{name} argument must be an integer number"))?;
            *slot = Some(parsed);
            index += 1;
        }
        index += 1;
    }

    if let Some(first) = unknown.first() {
        return Err(format!("Unknown argument: {first}"));
    }

    let rounds = raw.rounds.unwrap_or(i64::from(DEFAULT_ROUNDS));
    if rounds < 1 {
        return Err("rounds argument must be a postive number".to_string());
    }
    let threshold = raw.threshold.unwrap_or(i64::from(DEFAULT_THRESHOLD));
    if !(1..=100).contains(&threshold) {
        return Err("threshold argument must be a number between 1 & 100".to_string());
    }

    let level = required_stat(raw.level, "lvl")?;
    let hp = required_stat(raw.hp, "hp")?;
    let atk = required_stat(raw.atk, "atk")?;
    let def = required_stat(raw.def, "def")?;
    let seed = raw
        .seed
        .map(|seed| {
            u64::try_from(seed).map_err(|_| "seed argument must not be negative".to_string())
        })
        .transpose()?;

    Ok(CliAction::Simulate(SimulationOptions {
        level,
        hp,
        atk,
        def,
        rounds: u32::try_from(rounds).map_err(|_| "rounds argument is too large".to_string())?,
        threshold: threshold as u32,
        seed,
        barehanded: raw.barehanded,
        equipsame: raw.equipsame,
        noboost: raw.noboost,
        fair: raw.fair,
    }))
}

fn required_stat(value: Option<i64>, name: &str) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("{name} argument must be set"))?;
    u32::try_from(value).map_err(|_| format!("{name} argument must not be negative"))
}

pub fn description_text() -> String {
    [
        "",
        "Description:",
        "  A tool for simulating combat between a player & enemy.",
        "",
        "  It can be used to check if player vs. creature situation is balanced.",
    ]
    .join("\n")
}

pub fn usage_text() -> String {
    format!(
        "\nUsage:\
         \n\tsimulate_combat --lvl <lvl> --hp <hp> --atk <atk> --def <def>[ --rounds <rounds>][ --threshold <threshold>][ --seed <seed>][ flags...]\
         \n\tsimulate_combat --help\
         \n\nRegular Arguments:\
         \n\t--lvl:        Level at which player & enemy should be set.\
         \n\t--hp:         HP value of enemy.\
         \n\t--atk:        Attack level of enemy.\
         \n\t--def:        Defense level of enemy.\
         \n\t--rounds:     Number of rounds to simulate (default: {DEFAULT_ROUNDS}).\
         \n\t--threshold:  Difference threshold used to determine if combat was balanced (default: {DEFAULT_THRESHOLD}).\
         \n\t--seed:       Seed for the damage rolls; omit for a random seed.\
         \n\t--help|-h:    Show usage information & exit.\
         \n\nFlag Arguments:\
         \n\t--barehanded: Entities will not be equipped with weapons & armor.\
         \n\t--equipsame:  Enemy will be equipped with same weapons & armor as player.\
         \n\t--noboost:    Player will not get boost from equipment.\
         \n\t--fair:       Gives player weapon with atk 5 & no other equipment (overrides --barehanded)."
    )
}

/// The starter gear, matching the base item defs.
pub fn equipment_catalog() -> Vec<ItemTemplate> {
    vec![
        ItemTemplate::new("club", "club")
            .with_slots(["rhand", "lhand"])
            .with_atk(10),
        ItemTemplate::new("soul dagger", "sword")
            .with_slots(["rhand", "lhand"])
            .with_atk(5),
        ItemTemplate::new("wooden shield", "shield")
            .with_slots(["lhand", "rhand"])
            .with_def(2),
        ItemTemplate::new("dress", "armor").with_slots(["armor"]).with_def(1),
        ItemTemplate::new("leather helmet", "helmet")
            .with_slots(["head"])
            .with_def(1),
        ItemTemplate::new("leather legs", "legs")
            .with_slots(["legs"])
            .with_def(1),
        ItemTemplate::new("leather boots", "boots")
            .with_slots(["feet"])
            .with_def(1),
    ]
}

/// (slot, item) pairs of the default loadout.
const LOADOUT: [(&str, &str); 6] = [
    ("lhand", "wooden shield"),
    ("rhand", "club"),
    ("armor", "dress"),
    ("head", "leather helmet"),
    ("legs", "leather legs"),
    ("feet", "leather boots"),
];

fn equip_named(entity: &mut RpEntity, catalog: &[ItemTemplate], slot: &str, name: &str) -> bool {
    catalog
        .iter()
        .find(|template| template.name == name)
        .is_some_and(|template| entity.equip(slot, template.instantiate()))
}

pub fn build_player(options: &SimulationOptions, curve: &LevelCurve) -> RpEntity {
    let catalog = equipment_catalog();
    let level = options.level;
    let mut player =
        RpEntity::new(EntityId(1), ZoneId::new(SIMULATION_ZONE), "player").with_slots(PLAYER_SLOTS);
    player.set_level(level);
    player.set_base_hp(curve.hp(level));
    player.heal();
    player.set_atk(curve.atk(level));
    player.set_def(curve.def(level));

    if options.fair {
        equip_named(&mut player, &catalog, "rhand", "soul dagger");
    } else if !options.barehanded {
        for (slot, name) in LOADOUT {
            equip_named(&mut player, &catalog, slot, name);
        }
        if !options.noboost {
            apply_level_boosts(&mut player, curve.clamp_level(level));
        }
    }
    player
}

fn apply_level_boosts(player: &mut RpEntity, level: u32) {
    let level = i32::try_from(level).unwrap_or(i32::MAX);
    let shield_def = if level == 0 { 0 } else { 12 + level / 8 };
    player.modify_equipped("rhand", |weapon| weapon.set_atk(7 + level * 2 / 6));
    player.modify_equipped("lhand", |shield| shield.set_def(shield_def));
    player.modify_equipped("armor", |armor| armor.set_def(1 + level / 4));
    player.modify_equipped("head", |helmet| helmet.set_def(1 + level / 7));
    player.modify_equipped("legs", |legs| legs.set_def(1 + level / 7));
    player.modify_equipped("feet", |boots| boots.set_def(1 + level / 10));
}

/// The enemy takes the player's gear only with `--equipsame` and without `--barehanded`.
pub fn build_enemy(options: &SimulationOptions, player: &RpEntity) -> RpEntity {
    let mut enemy = RpEntity::new(EntityId(2), ZoneId::new(SIMULATION_ZONE), "dummy");
    enemy.set_level(options.level);
    enemy.set_base_hp(options.hp);
    enemy.heal();
    enemy.set_atk(options.atk);
    enemy.set_def(options.def);

    if options.equipsame && !options.barehanded {
        enemy = enemy.with_slots(PLAYER_SLOTS);
        let gear: Vec<(String, _)> = player
            .equipped()
            .map(|(slot, item)| (slot.to_string(), item.clone()))
            .collect();
        for (slot, item) in gear {
            enemy.equip(&slot, item);
        }
    }
    enemy
}

/// Runs every round and writes the per-round lines and the final summary to `out`.
pub fn run_simulation(
    options: &SimulationOptions,
    out: &mut impl Write,
) -> io::Result<SimulationReport> {
    let curve = LevelCurve::default();
    let formula = LogarithmicFormula::default();
    let mut rng = match options.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let mut player = build_player(options, &curve);
    let mut enemy = build_enemy(options, &player);

    writeln!(out, "\nRunning simulation: ...")?;
    let mut write_result = Ok(());
    let tally = simulate(
        &mut player,
        &mut enemy,
        &formula,
        &mut rng,
        options.rounds,
        DEFAULT_TURN_LIMIT,
        |index, result| {
            if write_result.is_err() {
                return;
            }
            write_result = write_round(&mut *out, index, options.rounds, result);
        },
    );
    write_result?;

    let report = SimulationReport::from_tally(tally, options.threshold);
    write_summary(out, &player, &enemy, &report)?;
    Ok(report)
}

fn write_round(
    out: &mut impl Write,
    index: u32,
    rounds: u32,
    result: &RoundResult,
) -> io::Result<()> {
    let outcome = result.outcome();
    if outcome == RoundOutcome::Incomplete {
        writeln!(
            out,
            "\nWARNING: Turn limit reached ({DEFAULT_TURN_LIMIT}), terminating round ..."
        )?;
    }
    writeln!(
        out,
        "\nRound {index}/{rounds} winner: {}\n  player HP: {}\n  enemy  HP: {}",
        outcome.label(),
        result.player_hp,
        result.enemy_hp
    )
}

fn write_stats(out: &mut impl Write, title: &str, entity: &RpEntity) -> io::Result<()> {
    writeln!(
        out,
        "\n  {title} stats:\
         \n    Level: {}\
         \n    HP:    {}\
         \n    ATK:   {}\
         \n           (item: {}, total: {})\
         \n    DEF:   {}\
         \n           (item: {}, total: {})",
        entity.level(),
        entity.base_hp(),
        entity.atk(),
        entity.item_atk(),
        entity.effective_atk(),
        entity.def(),
        entity.item_def(),
        entity.effective_def()
    )
}

fn write_summary(
    out: &mut impl Write,
    player: &RpEntity,
    enemy: &RpEntity,
    report: &SimulationReport,
) -> io::Result<()> {
    writeln!(out, "\nFINAL RESULT:")?;
    write_stats(out, "Player", player)?;
    write_stats(out, "Enemy", enemy)?;

    let tally = &report.tally;
    writeln!(
        out,
        "\n  Player wins:       {} ({}%)\
         \n  Enemy wins:        {} ({}%)\
         \n  Ties:              {} ({}%)\
         \n  Incomplete rounds: {}",
        tally.wins,
        report.win_ratio,
        tally.losses,
        report.loss_ratio,
        tally.ties,
        report.tie_ratio,
        tally.incomplete
    )?;

    writeln!(out, "\n  Resulting difference ratio: {}%", report.diff_ratio)?;
    let verdict = if report.within_threshold() {
        "is within"
    } else {
        "is not within"
    };
    writeln!(
        out,
        "    Result {verdict} balance threshold of {}%",
        report.threshold
    )?;
    writeln!(out, "    Beneficiary: {}", report.beneficiary.label())
}

#[cfg(test)]
mod tests {
    use engine::combat::Beneficiary;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    fn options(level: u32, hp: u32, atk: u32, def: u32) -> SimulationOptions {
        SimulationOptions {
            level,
            hp,
            atk,
            def,
            rounds: 20,
            threshold: DEFAULT_THRESHOLD,
            seed: Some(42),
            barehanded: false,
            equipsame: false,
            noboost: false,
            fair: false,
        }
    }

    #[test]
    fn aliases_and_case_are_accepted() {
        let parsed = parse_args(&args(&[
            "--LEVEL", "10", "--hp", "200", "--Attack", "14", "--defense", "30", "--noboost",
        ]))
        .expect("parse");
        let CliAction::Simulate(options) = parsed else {
            panic!("expected a simulation");
        };
        assert_eq!((options.level, options.hp, options.atk, options.def), (10, 200, 14, 30));
        assert_eq!(options.rounds, DEFAULT_ROUNDS);
        assert_eq!(options.threshold, DEFAULT_THRESHOLD);
        assert!(options.noboost);
        assert!(!options.fair);
    }

    #[test]
    fn help_wins_wherever_it_appears() {
        assert_eq!(
            parse_args(&args(&["--lvl", "3", "-h"])).expect("parse"),
            CliAction::Help
        );
        assert_eq!(parse_args(&args(&["HELP"])).expect("parse"), CliAction::Help);
    }

    #[test]
    fn argument_errors_use_usage_messages() {
        let cases: [(&[&str], &str); 7] = [
            (&["--lvl"], "lvl argument requires value"),
            (&["--hp", "lots"], "hp argument must be an integer number"),
            (&["--lvl", "1", "--bogus"], "Unknown argument: --bogus"),
            (&["--rounds", "0"], "rounds argument must be a postive number"),
            (
                &["--threshold", "101"],
                "threshold argument must be a number between 1 & 100",
            ),
            (&["--hp", "10"], "lvl argument must be set"),
            (&["--lvl", "1", "--hp", "10", "--atk", "5"], "def argument must be set"),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_args(&args(input)), Err(expected.to_string()), "{input:?}");
        }
    }

    #[test]
    fn boosted_player_gear_scales_with_level() {
        let player = build_player(&options(10, 200, 14, 30), &LevelCurve::default());
        assert_eq!(player.base_hp(), 200);
        assert_eq!(player.atk(), 14);
        assert_eq!(player.def(), 37);
        // club 7 + 20/6; shield 12 + 10/8; armor 1 + 10/4; helmet, legs 1 + 10/7; boots 1 + 10/10
        assert_eq!(player.item_atk(), 10);
        assert_eq!(player.item_def(), 13 + 3 + 2 + 2 + 2);
    }

    #[test]
    fn gear_boosts_stop_at_the_highest_level() {
        let curve = LevelCurve::default();
        let capped = build_player(&options(curve.highest_level, 200, 14, 30), &curve);
        let huge = build_player(&options(2_000_000_000, 200, 14, 30), &curve);
        assert_eq!(huge.item_atk(), capped.item_atk());
        assert_eq!(huge.item_def(), capped.item_def());
        assert_eq!(huge.item_atk(), 7 + 597 * 2 / 6);
    }

    #[test]
    fn fair_player_only_holds_the_dagger() {
        let mut fair = options(5, 100, 5, 5);
        fair.fair = true;
        fair.barehanded = true;
        let player = build_player(&fair, &LevelCurve::default());
        assert_eq!(player.item_atk(), 5);
        assert_eq!(player.item_def(), 0);
        assert_eq!(player.count_equipped("soul dagger"), 1);

        let mut bare = options(5, 100, 5, 5);
        bare.barehanded = true;
        bare.equipsame = true;
        let player = build_player(&bare, &LevelCurve::default());
        let enemy = build_enemy(&bare, &player);
        assert_eq!(player.equipped().count(), 0);
        assert_eq!(enemy.equipped().count(), 0);
    }

    #[test]
    fn equipsame_copies_player_gear_to_enemy() {
        let mut same = options(0, 100, 2, 2);
        same.equipsame = true;
        let player = build_player(&same, &LevelCurve::default());
        let enemy = build_enemy(&same, &player);
        assert_eq!(enemy.item_atk(), player.item_atk());
        assert_eq!(enemy.item_def(), player.item_def());
        assert_eq!(enemy.base_hp(), 100);
    }

    #[test]
    fn overwhelming_player_wins_every_round() {
        let mut out = Vec::new();
        let report = run_simulation(&options(50, 10, 1, 1), &mut out).expect("simulate");
        let text = String::from_utf8(out).expect("utf8");

        assert_eq!(report.tally.wins, 20);
        assert_eq!(report.beneficiary, Beneficiary::Player);
        assert!(!report.within_threshold());
        assert!(text.contains("Round 20/20 winner: player"));
        assert!(text.contains("FINAL RESULT:"));
        assert!(text.contains("Result is not within balance threshold of 5%"));
        assert!(text.trim_end().ends_with("Beneficiary: player"));
    }

    #[test]
    fn same_seed_gives_same_report() {
        let run = || {
            let mut out = Vec::new();
            run_simulation(&options(5, 150, 8, 10), &mut out).expect("simulate")
        };
        assert_eq!(run(), run());
    }
}
