use std::time::Duration;

pub const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_CONFIG: &str = "config.json";
pub const DEFAULT_CONFIG_SAVE: &str = "config.json";
pub const DEFAULT_DB_URL: &str = "sqlite://controllerv1.sqlite";
pub const DEFAULT_NAMESPACE: &str = "coingro";
pub const DEFAULT_EXCHANGE: &str = "binance";
pub const DEFAULT_STAKE_CURRENCY: &str = "USDT";
pub const DEFAULT_STRATEGY: &str = "Strategy001";
pub const DEFAULT_STRATEGIES_PVC_CLAIM: &str = "strategies-pvc";
pub const USER_DATA_DIR: &str = "/coingro/user_data";
pub const STRATEGIES_DIR: &str = "/coingro/strategies";

/// Binary executed inside the bot container.
pub const CG_BIN: &str = "coingro";

pub const ENV_VAR_PREFIX: &str = "COINGRO_CONTROLLER__";

/// Default database name when `db_config` names a server-backed driver.
pub const DEFAULT_DATABASE: &str = "coingro_k8s_controller";

pub const PROCESS_THROTTLE_SECS: u64 = 300;
pub const HEARTBEAT_INTERVAL: u64 = 60;
pub const RETRY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long strategy statistics stay fresh before a refresh is due.
pub const STRATEGY_REFRESH_PERIOD_HOURS: i64 = 1;

/// Depth limit for `add_config_files` recursion.
pub const MAX_CONFIG_DEPTH: u32 = 5;

pub const DATETIME_PRINT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SUPPORTED_EXCHANGES: &[(&str, &[&str])] = &[
    ("binance", &["key", "secret"]),
    ("bittrex", &["key", "secret"]),
    ("ftx", &["key", "secret"]),
    ("gateio", &["key", "secret"]),
    ("huobi", &["key", "secret"]),
    ("kraken", &["key", "secret"]),
    ("kucoin", &["key", "secret", "password"]),
    ("okx", &["key", "secret", "password"]),
];

pub const SUPPORTED_STAKE_CURRENCIES: &[&str] = &["BTC", "ETH", "USDT", "USDC", "BUSD"];

pub const SUPPORTED_FORCEENTER_CURRENCIES: &[&str] =
    &["BTC", "ETH", "USDT", "USDC", "BUSD", "EUR", "USD"];

pub const SUPPORTED_FIAT: &[&str] = &[
    "AUD", "BRL", "CAD", "CHF", "CLP", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF", "IDR",
    "ILS", "INR", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PKR", "PLN", "RUB", "SEK",
    "SGD", "THB", "TRY", "TWD", "ZAR", "USD",
];
