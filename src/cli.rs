use chrono::Datelike;
use log::info;
use std::env;
use std::ffi::OsStr;
use std::time::Duration;

use crate::budget_client::*;
use crate::budget_formatter::*;
use crate::budget_session::*;
use crate::constants::*;
use crate::database::*;
use crate::draft_storage::*;
use crate::draft_store::*;
use crate::errors::*;
use crate::grid::*;
use crate::overview::*;
use crate::overview_loader::*;
use crate::types::*;

pub fn run() -> Result<()> {
    initialize()?;
    run_clap_matches(get_clap_matches())
}

fn initialize() -> Result<()> {
    openssl_probe::init_ssl_cert_env_vars();
    dotenv::dotenv().ok();
    env_logger::init();

    let proj_dirs = directories::ProjectDirs::from("io", "budget-drafts", clap::crate_name!())
        .chain_err(|| "Failed to determine user data directory")?;
    let mut default_database_file = proj_dirs.data_dir().to_path_buf();
    default_database_file.push(DEFAULT_DATABASE_FILENAME);

    default_env(DATABASE_FILE_ENV, default_database_file);
    default_env(YEAR_ENV, chrono::Local::today().year().to_string());
    default_env(MAX_PENDING_ENTRIES_ENV, DEFAULT_MAX_PENDING_ENTRIES.to_string());
    default_env(
        PERSIST_DEBOUNCE_MS_ENV,
        (DEFAULT_PERSIST_DEBOUNCE.as_millis() as u64).to_string(),
    );

    Ok(())
}

fn get_clap_matches() -> clap::ArgMatches<'static> {
    let section_arg = || {
        clap::Arg::with_name(SECTION_ARG)
            .long(SECTION_ARG)
            .value_name("GROUP")
            .help("Budget group id or title")
            .takes_value(true)
            .required(true)
    };
    let row_arg = || {
        clap::Arg::with_name(ROW_ARG)
            .long(ROW_ARG)
            .value_name("ROW")
            .help("Row id or label")
            .takes_value(true)
            .required(true)
    };
    let month_arg = || {
        clap::Arg::with_name(MONTH_ARG)
            .long(MONTH_ARG)
            .value_name("MONTH")
            .help("Month number (1-12) or month label")
            .takes_value(true)
            .required(true)
    };
    let title_arg = || {
        clap::Arg::with_name(TITLE_ARG)
            .long(TITLE_ARG)
            .value_name("TITLE")
            .help("Budget group name")
            .takes_value(true)
            .required(true)
    };
    let id_arg = || {
        clap::Arg::with_name(ID_ARG)
            .long(ID_ARG)
            .value_name("ID")
            .help("Budget group id")
            .takes_value(true)
            .required(true)
    };
    clap::App::new(clap::crate_name!())
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about(clap::crate_description!())
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(
            clap::Arg::with_name(API_URL_ARG)
                .env(API_URL_ENV)
                .long(API_URL_ARG)
                .value_name("URL")
                .help("Base URL of the budget API")
                .takes_value(true)
                .required(true),
        )
        .arg(
            clap::Arg::with_name(ACCESS_TOKEN_ARG)
                .env(ACCESS_TOKEN_ENV)
                .long(ACCESS_TOKEN_ARG)
                .value_name("TOKEN")
                .help("Access token for the budget API")
                .takes_value(true)
                .required(true),
        )
        .arg(
            clap::Arg::with_name(REFRESH_TOKEN_ARG)
                .env(REFRESH_TOKEN_ENV)
                .long(REFRESH_TOKEN_ARG)
                .value_name("TOKEN")
                .help("Refresh token used to renew a rejected access token")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name(YEAR_ARG)
                .env(YEAR_ENV)
                .long(YEAR_ARG)
                .value_name("YYYY")
                .help("Budget year.  Defaults to the current year.")
                .takes_value(true)
                .validator(|value| {
                    value
                        .parse::<i32>()
                        .map(|_| ())
                        .map_err(|err| err.to_string())
                }),
        )
        .arg(
            clap::Arg::with_name(MAX_PENDING_ENTRIES_ARG)
                .env(MAX_PENDING_ENTRIES_ENV)
                .long(MAX_PENDING_ENTRIES_ARG)
                .value_name("COUNT")
                .help("Number of undoable additions kept per cell")
                .takes_value(true)
                .validator(|value| match value.parse::<usize>() {
                    Ok(count) if count > 0 => Ok(()),
                    Ok(_) => Err("must be at least 1".to_string()),
                    Err(err) => Err(err.to_string()),
                }),
        )
        .arg(
            clap::Arg::with_name(PERSIST_DEBOUNCE_MS_ARG)
                .env(PERSIST_DEBOUNCE_MS_ENV)
                .long(PERSIST_DEBOUNCE_MS_ARG)
                .value_name("MILLISECONDS")
                .help("Delay before a changed draft is saved")
                .takes_value(true)
                .validator(|value| {
                    value
                        .parse::<u64>()
                        .map(|_| ())
                        .map_err(|err| err.to_string())
                }),
        )
        .arg(
            clap::Arg::with_name(DATABASE_FILE_ARG)
                .env(DATABASE_FILE_ENV)
                .long(DATABASE_FILE_ARG)
                .value_name("PATH")
                .help("Set the database file where drafts will be stored")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name(DRY_RUN_ARG)
                .long(DRY_RUN_ARG)
                .short("n")
                .help("Do not save the draft (changes are shown but discarded)"),
        )
        .subcommand(clap::SubCommand::with_name(SHOW_COMMAND).about("Show the budget grid"))
        .subcommand(
            clap::SubCommand::with_name(ADD_COMMAND)
                .about("Add an amount to a cell")
                .arg(section_arg())
                .arg(row_arg())
                .arg(month_arg())
                .arg(
                    clap::Arg::with_name(AMOUNT_ARG)
                        .long(AMOUNT_ARG)
                        .value_name("AMOUNT")
                        .help("Amount to add; may be negative")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .required(true)
                        .validator(|value| {
                            parse_amount(&value)
                                .map(|_| ())
                                .map_err(|err| err.to_string())
                        }),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name(UNDO_COMMAND)
                .about("Undo the most recent addition to a cell")
                .arg(section_arg())
                .arg(row_arg())
                .arg(month_arg()),
        )
        .subcommand(
            clap::SubCommand::with_name(PENDING_COMMAND)
                .about("List undoable additions")
                .arg(section_arg().required(false)),
        )
        .subcommand(
            clap::SubCommand::with_name(CREATE_GROUP_COMMAND)
                .about("Create a budget group")
                .arg(title_arg())
                .arg(
                    clap::Arg::with_name(COLOR_ARG)
                        .long(COLOR_ARG)
                        .value_name("#RRGGBB")
                        .help("Group color")
                        .takes_value(true),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name(RENAME_GROUP_COMMAND)
                .about("Rename a budget group")
                .arg(id_arg())
                .arg(title_arg()),
        )
        .subcommand(
            clap::SubCommand::with_name(DELETE_GROUP_COMMAND)
                .about("Delete a budget group")
                .arg(id_arg()),
        )
        .subcommand(
            clap::SubCommand::with_name(ASSIGN_COMMAND)
                .about("Assign categories to budget groups")
                .arg(
                    clap::Arg::with_name(ASSIGNMENT_ARG)
                        .value_name("CATEGORY[=GROUP]")
                        .help("Category id, optionally followed by =GROUP; no group unassigns")
                        .multiple(true)
                        .required(true)
                        .validator(|value| {
                            if ASSIGNMENT_REGEX.is_match(&value) {
                                Ok(())
                            } else {
                                Err(format!("Invalid assignment: {}", value))
                            }
                        }),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name(RESET_DRAFT_COMMAND)
                .about("Delete the saved draft for the year"),
        )
        .get_matches()
}

fn run_clap_matches(matches: clap::ArgMatches) -> Result<()> {
    let dry_run = matches.is_present(DRY_RUN_ARG);
    let year = clap::value_t!(matches.value_of(YEAR_ARG), i32)
        .expect("CLAP matches should have valid YEAR_ARG");
    let settings = EngineSettings {
        max_pending_entries: clap::value_t!(matches.value_of(MAX_PENDING_ENTRIES_ARG), usize)
            .expect("CLAP matches should have valid MAX_PENDING_ENTRIES_ARG"),
        persist_debounce: Duration::from_millis(
            clap::value_t!(matches.value_of(PERSIST_DEBOUNCE_MS_ARG), u64)
                .expect("CLAP matches should have valid PERSIST_DEBOUNCE_MS_ARG"),
        ),
    };
    let api_client = BudgetApiClient::new(
        matches
            .value_of(API_URL_ARG)
            .expect("CLAP matches should have API_URL_ARG"),
        matches
            .value_of(ACCESS_TOKEN_ARG)
            .expect("CLAP matches should have ACCESS_TOKEN_ARG")
            .to_string(),
        matches.value_of(REFRESH_TOKEN_ARG).map(str::to_string),
        Some(Box::new(|_: &str| info!("Budget API access token was renewed"))),
    );
    let database = Database::establish_connection(
        matches
            .value_of(DATABASE_FILE_ARG)
            .expect("CLAP matches should have DATABASE_FILE_ARG"),
        dry_run,
    )?;
    let mut session = BudgetSession::new(&api_client, &database, year, settings);

    let result = match matches.subcommand() {
        (RESET_DRAFT_COMMAND, _) => {
            reset_draft(&database, year).map(|message| println!("{}", message))
        }
        (ASSIGN_COMMAND, Some(sub_matches)) => assign_categories(&mut session, sub_matches),
        (command, sub_matches) => run_budget_command(&mut session, command, sub_matches),
    };
    let notices = session.take_notices();
    if result.is_ok() {
        for notice in notices {
            println!("Notice: {}", notice);
        }
        if session.flush() && !dry_run {
            println!("Saved draft for {}.", year);
        }
    }
    session.close();
    result
}

fn run_budget_command(
    session: &mut BudgetSession,
    command: &str,
    sub_matches: Option<&clap::ArgMatches>,
) -> Result<()> {
    println!("Loading budget overview for {}...", session.year());
    if let LoadOutcome::Failed(FailureMode::Blocking) = session.load() {
        bail!(
            "Could not load the {} budget: {}",
            session.year(),
            session.loader().blocking_error().unwrap_or("unknown error")
        );
    }
    let overview = session
        .overview()
        .cloned()
        .chain_err(|| "Budget overview is not available")?;
    let formatter = BudgetFormatter::for_overview(&overview);
    let sub_matches = sub_matches.cloned().unwrap_or_default();

    match command {
        ADD_COMMAND => {
            let (section_id, row_id, month_index) =
                resolve_cell(session.store(), &overview, &sub_matches)?;
            let amount = parse_amount(
                sub_matches
                    .value_of(AMOUNT_ARG)
                    .expect("CLAP matches should have AMOUNT_ARG"),
            )?;
            let entry = session
                .store_mut()
                .add_to_cell(&section_id, &row_id, month_index, amount)?;
            println!(
                "Added {} to {} / {}.",
                formatter.format_amount(entry.delta),
                entry.row_label,
                entry.month_label
            );
            print_cell(session.store(), &formatter, &section_id, &row_id, month_index);
        }
        UNDO_COMMAND => {
            let (section_id, row_id, month_index) =
                resolve_cell(session.store(), &overview, &sub_matches)?;
            match session
                .store_mut()
                .undo_last_pending_entry_for_cell(&section_id, &row_id, month_index)
            {
                Some(entry) => println!(
                    "Undid {} on {} / {}.",
                    formatter.format_amount(entry.delta),
                    entry.row_label,
                    entry.month_label
                ),
                None => println!("Nothing to undo for this cell."),
            }
            print_cell(session.store(), &formatter, &section_id, &row_id, month_index);
        }
        PENDING_COMMAND => {
            let section_id = match sub_matches.value_of(SECTION_ARG) {
                Some(section) => Some(resolve_section(session.store(), section)?),
                None => None,
            };
            let listing = render_pending_entries(session.store(), section_id.as_ref(), &formatter);
            if listing.is_empty() {
                println!("No pending changes.");
            } else {
                print!("{}", listing);
            }
        }
        CREATE_GROUP_COMMAND => {
            let title = sub_matches
                .value_of(TITLE_ARG)
                .expect("CLAP matches should have TITLE_ARG");
            let id = session.create_group(title, sub_matches.value_of(COLOR_ARG))?;
            println!("Created budget group {} ({}).", title.trim(), id);
        }
        RENAME_GROUP_COMMAND => {
            let id = SectionId::new(
                sub_matches
                    .value_of(ID_ARG)
                    .expect("CLAP matches should have ID_ARG"),
            );
            let title = sub_matches
                .value_of(TITLE_ARG)
                .expect("CLAP matches should have TITLE_ARG");
            session.rename_group(&id, title)?;
            println!("Renamed budget group {} to {}.", id, title.trim());
        }
        DELETE_GROUP_COMMAND => {
            let id = SectionId::new(
                sub_matches
                    .value_of(ID_ARG)
                    .expect("CLAP matches should have ID_ARG"),
            );
            session.delete_group(&id)?;
            println!("Deleted budget group {}.", id);
        }
        _ => print!("{}", render_budget(session.store(), &overview, &formatter)),
    }
    Ok(())
}

fn assign_categories(session: &mut BudgetSession, sub_matches: &clap::ArgMatches) -> Result<()> {
    let assignments = sub_matches
        .values_of(ASSIGNMENT_ARG)
        .expect("CLAP matches should have ASSIGNMENT_ARG")
        .map(parse_assignment)
        .collect::<Result<Vec<_>>>()?;
    println!("Saving {} category assignments...", assignments.len());
    session.sync_category_assignments(&assignments)
}

fn reset_draft(database: &Database, year: i32) -> Result<String> {
    delete_draft(database, year)?;
    Ok(if database.is_dry_run() {
        format!("Dry run: the local draft for {} was left in place.", year)
    } else {
        format!("Cleared the local draft for {}.", year)
    })
}

fn parse_amount(value: &str) -> Result<f64> {
    let amount = value
        .trim()
        .parse::<f64>()
        .chain_err(|| ErrorKind::Validation(format!("Invalid amount: {}", value)))?;
    ensure!(
        amount.is_finite(),
        ErrorKind::Validation(format!("Amount must be a finite number: {}", value))
    );
    Ok(amount)
}

fn parse_assignment(value: &str) -> Result<CategoryAssignment> {
    let captures = ASSIGNMENT_REGEX
        .captures(value)
        .chain_err(|| ErrorKind::Validation(format!("Invalid assignment: {}", value)))?;
    Ok(CategoryAssignment {
        category_id: captures[1].to_string(),
        budget_group_id: captures
            .get(2)
            .map(|group| group.as_str().to_string())
            .filter(|group| !group.is_empty()),
    })
}

fn resolve_section(store: &DraftStore, section: &str) -> Result<SectionId> {
    store
        .sections()
        .iter()
        .find(|s| s.id.0 == section)
        .or_else(|| {
            store
                .sections()
                .iter()
                .find(|s| s.title.to_lowercase() == section.to_lowercase())
        })
        .map(|s| s.id.clone())
        .chain_err(|| ErrorKind::Validation(format!("Unknown budget group: {}", section)))
}

fn resolve_cell(
    store: &DraftStore,
    overview: &Overview,
    sub_matches: &clap::ArgMatches,
) -> Result<(SectionId, RowId, usize)> {
    let section_id = resolve_section(
        store,
        sub_matches
            .value_of(SECTION_ARG)
            .expect("CLAP matches should have SECTION_ARG"),
    )?;
    let row = sub_matches
        .value_of(ROW_ARG)
        .expect("CLAP matches should have ROW_ARG");
    let row_id = store
        .find_section(&section_id)
        .and_then(|section| section.find_row_by_id_or_label(row))
        .map(|row| row.id.clone())
        .chain_err(|| {
            ErrorKind::Validation(format!("Unknown row {} in budget group {}", row, section_id))
        })?;
    let month = sub_matches
        .value_of(MONTH_ARG)
        .expect("CLAP matches should have MONTH_ARG");
    let month_index = overview
        .find_month_index(month)
        .chain_err(|| ErrorKind::Validation(format!("Unknown month: {}", month)))?;
    Ok((section_id, row_id, month_index))
}

fn print_cell(
    store: &DraftStore,
    formatter: &BudgetFormatter,
    section_id: &SectionId,
    row_id: &RowId,
    month_index: usize,
) {
    if let Some(section) = store.find_section(section_id) {
        let value = section
            .find_row(row_id)
            .map_or(0.0, |row| row.value(month_index));
        let total = crate::totals::section_month_totals(section, store.month_count())
            .get(month_index)
            .cloned()
            .unwrap_or(0.0);
        println!(
            "  cell: {}  {}: {}  pending additions: {}",
            formatter.format_amount(value),
            section.footer_label,
            formatter.format_amount(total),
            store
                .get_pending_entries(section_id, row_id, month_index)
                .len()
        );
    }
}

fn default_env<V: AsRef<OsStr>>(var_name: &str, default_value: V) {
    if let Err(env::VarError::NotPresent) = env::var(var_name) {
        env::set_var(var_name, default_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("cat-1=food").unwrap(),
            CategoryAssignment {
                category_id: "cat-1".to_string(),
                budget_group_id: Some("food".to_string()),
            }
        );
        assert_eq!(parse_assignment("cat-2").unwrap().budget_group_id, None);
        assert_eq!(parse_assignment("cat-3=").unwrap().budget_group_id, None);
        assert!(parse_assignment("a=b=c").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("40").unwrap(), 40.0);
        assert_eq!(parse_amount("-12.5").unwrap(), -12.5);
        for value in &["NaN", "nan", "inf", "-inf", "infinity", "abc", ""] {
            match parse_amount(value) {
                Err(Error(ErrorKind::Validation(_), _)) => {}
                other => panic!("{} parsed as {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_reset_draft_reports_dry_run() {
        let database = Database::establish_connection(":memory:", true).unwrap();
        assert_eq!(
            reset_draft(&database, 2025).unwrap(),
            "Dry run: the local draft for 2025 was left in place."
        );
        let database = Database::establish_connection(":memory:", false).unwrap();
        assert_eq!(
            reset_draft(&database, 2025).unwrap(),
            "Cleared the local draft for 2025."
        );
    }
}
