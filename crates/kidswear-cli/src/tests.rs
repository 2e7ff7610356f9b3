use super::*;
use kidswear_core::{Locale, SortMode};
use rust_decimal::Decimal;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["kidswear", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["kidswear", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_seed_with_and_without_path() {
    let cli = Cli::try_parse_from(["kidswear", "db", "seed"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed { path: None }
        })
    ));

    let cli = Cli::try_parse_from(["kidswear", "db", "seed", "--path", "demo/catalog.yaml"])
        .expect("expected valid cli args");
    let Some(Commands::Db {
        command: DbCommands::Seed { path: Some(path) },
    }) = cli.command
    else {
        panic!("expected db seed with a path");
    };
    assert_eq!(path, PathBuf::from("demo/catalog.yaml"));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["kidswear"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_inventory_alerts() {
    let cli = Cli::try_parse_from(["kidswear", "inventory", "alerts"]).expect("valid args");
    assert!(matches!(
        cli.command,
        Some(Commands::Inventory {
            command: InventoryCommands::Alerts
        })
    ));
}

#[test]
fn categories_kind_is_optional() {
    let cli = Cli::try_parse_from(["kidswear", "categories"]).expect("valid args");
    assert!(matches!(cli.command, Some(Commands::Categories { kind: None })));

    let cli =
        Cli::try_parse_from(["kidswear", "categories", "--kind", "smart"]).expect("valid args");
    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            kind: Some(KindArg::Smart)
        })
    ));
    assert!(Cli::try_parse_from(["kidswear", "categories", "--kind", "fancy"]).is_err());
}

#[test]
fn search_arguments_build_a_request() {
    let cli = Cli::try_parse_from([
        "kidswear",
        "search",
        "jacket",
        "--category",
        "smart-deals",
        "--category",
        "boys-zone",
        "--size",
        "4Y",
        "--price-max",
        "100",
        "--in-stock",
        "--sort",
        "price-asc",
        "--locale",
        "en",
        "--limit",
        "5",
    ])
    .expect("valid args");
    let Some(Commands::Search(args)) = cli.command else {
        panic!("expected search");
    };

    let request = args.into_request();
    assert_eq!(request.query, "jacket");
    assert_eq!(request.filters.categories, vec!["smart-deals", "boys-zone"]);
    assert_eq!(request.filters.sizes, vec!["4Y"]);
    assert_eq!(request.filters.price_max, Some(Decimal::from(100)));
    assert!(request.filters.in_stock_only);
    assert!(!request.filters.sale_only);
    assert_eq!(request.filters.sort, SortMode::PriceAsc);
    assert_eq!(request.locale, Locale::En);
    assert_eq!(request.limit, Some(5));
}

#[test]
fn search_defaults_to_an_empty_featured_query() {
    let cli = Cli::try_parse_from(["kidswear", "search"]).expect("valid args");
    let Some(Commands::Search(args)) = cli.command else {
        panic!("expected search");
    };
    let request = args.into_request();
    assert!(request.query.is_empty());
    assert_eq!(request.filters.sort, SortMode::Featured);
    assert_eq!(request.locale, Locale::He);
    assert_eq!(request.offset, 0);
}

#[test]
fn unknown_locale_is_rejected() {
    assert!(Cli::try_parse_from(["kidswear", "search", "--locale", "fr"]).is_err());
}
