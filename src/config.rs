use crate::entities::DiscountType;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub coupons: CouponConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 分配序列号时等待计数器行锁的上限 (毫秒)，0 表示不限制
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

/// 批次与券生成相关的业务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponConfig {
    /// 新租户计数器的起始值，第一张券序列号为 seed + 1
    #[serde(default = "default_serial_seed")]
    pub serial_seed: i64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: i64,
    /// 每条 INSERT 语句写入的行数
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
    #[serde(default = "default_discount_type")]
    pub default_discount_type: DiscountType,
    #[serde(default)]
    pub default_discount_value: i64,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_serial_seed() -> i64 {
    30000
}

fn default_max_batch_size() -> i64 {
    100_000
}

fn default_insert_chunk_size() -> usize {
    1000
}

fn default_validity_days() -> i64 {
    365
}

fn default_discount_type() -> DiscountType {
    DiscountType::Percentage
}

impl Default for CouponConfig {
    fn default() -> Self {
        Self {
            serial_seed: default_serial_seed(),
            max_batch_size: default_max_batch_size(),
            insert_chunk_size: default_insert_chunk_size(),
            validity_days: default_validity_days(),
            default_discount_type: default_discount_type(),
            default_discount_value: 0,
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_only()?,
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config =
            toml::from_str(config_str).map_err(|e| format!("解析配置文件失败: {e}"))?;
        Ok(config)
    }

    fn from_env_only() -> Result<Self, Box<dyn std::error::Error>> {
        // 数据库 URL 在无配置文件时必须提供
        let database_url = get_env("DATABASE_URL")
            .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                lock_timeout_ms: get_env_parse("DB_LOCK_TIMEOUT_MS", default_lock_timeout_ms()),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET")
                    .unwrap_or_else(|| "change-me-in-production".to_string()),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
            },
            coupons: CouponConfig::default(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("DB_LOCK_TIMEOUT_MS")
            && let Ok(ms) = v.parse()
        {
            self.database.lock_timeout_ms = ms;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }

        // 券参数
        if let Ok(v) = env::var("COUPON_SERIAL_SEED")
            && let Ok(n) = v.parse()
        {
            self.coupons.serial_seed = n;
        }
        if let Ok(v) = env::var("COUPON_MAX_BATCH_SIZE")
            && let Ok(n) = v.parse()
        {
            self.coupons.max_batch_size = n;
        }
        if let Ok(v) = env::var("COUPON_INSERT_CHUNK_SIZE")
            && let Ok(n) = v.parse()
        {
            self.coupons.insert_chunk_size = n;
        }
        if let Ok(v) = env::var("COUPON_VALIDITY_DAYS")
            && let Ok(n) = v.parse()
        {
            self.coupons.validity_days = n;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.coupons.serial_seed < 0 {
            return Err(AppError::ConfigError("coupons.serial_seed 不能为负数".into()));
        }
        if self.coupons.max_batch_size < 1 {
            return Err(AppError::ConfigError("coupons.max_batch_size 必须大于 0".into()));
        }
        // Postgres 单条语句最多 65535 个绑定参数，每行券写入 9 个参数
        if self.coupons.insert_chunk_size == 0 || self.coupons.insert_chunk_size > 5000 {
            return Err(AppError::ConfigError("coupons.insert_chunk_size 必须在 1..=5000 之间".into()));
        }
        if self.coupons.validity_days < 1 {
            return Err(AppError::ConfigError("coupons.validity_days 必须大于 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "postgres://localhost/coupons"
        max_connections = 5

        [jwt]
        secret = "secret"
        access_token_expires_in = 3600
    "#;

    #[test]
    fn test_coupon_defaults_when_section_missing() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.coupons.serial_seed, 30000);
        assert_eq!(config.coupons.max_batch_size, 100_000);
        assert_eq!(config.coupons.insert_chunk_size, 1000);
        assert_eq!(config.coupons.validity_days, 365);
        assert_eq!(config.coupons.default_discount_type, DiscountType::Percentage);
        assert_eq!(config.database.lock_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_coupon_section_parsed() {
        let raw = format!(
            "{MINIMAL}\n[coupons]\nserial_seed = 100\ninsert_chunk_size = 250\ndefault_discount_type = \"flat\"\ndefault_discount_value = 500\n"
        );
        let config = Config::from_toml_str(&raw).unwrap();
        assert_eq!(config.coupons.serial_seed, 100);
        assert_eq!(config.coupons.insert_chunk_size, 250);
        assert_eq!(config.coupons.default_discount_type, DiscountType::Flat);
        assert_eq!(config.coupons.default_discount_value, 500);
        assert_eq!(config.coupons.max_batch_size, 100_000);
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.coupons.insert_chunk_size = 10_000;
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
        config.coupons.insert_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
