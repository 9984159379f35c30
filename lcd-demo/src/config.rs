use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use liquidcrystal_gpio::GpioActiveLevel;
use liquidcrystal_gpio::GpioResult;
use liquidcrystal_gpio::lcd::hd44780::Geometry;
use liquidcrystal_gpio::lcd::hd44780::driver::{ExpanderPinMap, Font};
use serde::{Serialize, Deserialize};
use eyre::WrapErr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub cols: u8,
    pub rows: u8,
    #[serde(default)]
    pub font: FontConfig,
    pub transport: TransportConfig,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FontConfig {
    #[default]
    Dots5x8,
    Dots5x10,
}

impl From<FontConfig> for Font {
    fn from(font: FontConfig) -> Self {
        match font {
            FontConfig::Dots5x8 => Font::Dots5x8,
            FontConfig::Dots5x10 => Font::Dots5x10,
        }
    }
}

/// How the display is wired to the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Lines of a GPIO chip. `data` holds D4..D7 or D0..D7.
    Gpio {
        chip: String,
        rs: usize,
        rw: Option<usize>,
        e: usize,
        data: Vec<usize>,
        backlight: Option<usize>,
        #[serde(default)]
        backlight_active_low: bool,
    },
    /// PCF8574 backpack on `/dev/i2c-<bus>`.
    I2c {
        bus: u8,
        address: u16,
        #[serde(default)]
        pin_map: PinMapConfig,
        #[serde(default)]
        backlight_active_low: bool,
    },
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PinMapConfig {
    #[default]
    Common,
    LowNibbleData,
}

impl PinMapConfig {
    pub fn resolve(self, backlight_active_low: bool) -> ExpanderPinMap {
        let pin_map = match self {
            PinMapConfig::Common => ExpanderPinMap::COMMON,
            PinMapConfig::LowNibbleData => ExpanderPinMap::LOW_NIBBLE_DATA,
        };
        ExpanderPinMap {
            backlight_level: active_level(backlight_active_low),
            ..pin_map
        }
    }
}

pub fn active_level(active_low: bool) -> GpioActiveLevel {
    if active_low {
        GpioActiveLevel::Low
    } else {
        GpioActiveLevel::High
    }
}

impl Config {
    /// Path of the config file, `CONFIG_FILE` or `lcd.json`.
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("lcd.json"));
        PathBuf::from(config_str)
    }

    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(&Self::path())
    }

    /// Loads the config at `config_path`, or `None` if there is no file there.
    ///
    /// A file that exists but can't be read or parsed is an error, so it never gets replaced by
    /// the default config.
    pub fn load_from(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)
            .wrap_err_with(|| format!("Couldn't open config {:?}", config_path))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Invalid config {:?}", config_path))?;
        Ok(Some(config))
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn geometry(&self) -> GpioResult<Geometry> {
        Geometry::new(self.cols, self.rows)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cols: 16,
            rows: 2,
            font: FontConfig::Dots5x8,
            transport: TransportConfig::I2c {
                bus: 1,
                address: 0x27,
                pin_map: PinMapConfig::Common,
                backlight_active_low: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidcrystal_gpio::GpioError;
    use liquidcrystal_gpio::lcd::hd44780::LCD_16X2;

    #[test]
    fn default_is_common_backpack() {
        let config = Config::default();
        assert_eq!(config.geometry(), Ok(LCD_16X2));
        match config.transport {
            TransportConfig::I2c { bus, address, pin_map, backlight_active_low } => {
                assert_eq!((bus, address), (1, 0x27));
                assert_eq!(pin_map.resolve(backlight_active_low), ExpanderPinMap::COMMON);
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn parses_gpio_wiring() {
        let json = r#"{
            "cols": 20,
            "rows": 4,
            "transport": {
                "kind": "gpio",
                "chip": "/dev/gpiochip0",
                "rs": 7,
                "rw": null,
                "e": 8,
                "data": [25, 24, 23, 18],
                "backlight": 12,
                "backlight_active_low": true
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.font, FontConfig::Dots5x8);
        assert_eq!(
            config.transport,
            TransportConfig::Gpio {
                chip: "/dev/gpiochip0".to_string(),
                rs: 7,
                rw: None,
                e: 8,
                data: vec![25, 24, 23, 18],
                backlight: Some(12),
                backlight_active_low: true,
            }
        );
    }

    #[test]
    fn i2c_defaults_and_polarity() {
        let json = r#"{
            "cols": 16,
            "rows": 1,
            "font": "dots5x10",
            "transport": { "kind": "i2c", "bus": 0, "address": 63, "backlight_active_low": true }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(Font::from(config.font), Font::Dots5x10);
        let TransportConfig::I2c { pin_map, backlight_active_low, .. } = config.transport else {
            panic!("expected an I2C transport");
        };
        let resolved = pin_map.resolve(backlight_active_low);
        assert_eq!(resolved.backlight_level, GpioActiveLevel::Low);
        assert_eq!(resolved.data, ExpanderPinMap::COMMON.data);
    }

    #[test]
    fn rejects_impossible_geometry() {
        let config = Config {
            cols: 40,
            rows: 4,
            ..Config::default()
        };
        assert_eq!(config.geometry(), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("lcd-demo-config-{}.json", std::process::id()));
        let config = Config {
            transport: TransportConfig::I2c {
                bus: 3,
                address: 0x3F,
                pin_map: PinMapConfig::LowNibbleData,
                backlight_active_low: false,
            },
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, Some(config));
        assert_eq!(Config::load_from(&path).unwrap(), None);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let path = std::env::temp_dir().join(format!("lcd-demo-bad-config-{}.json", std::process::id()));
        let contents = r#"{"cols":20,"rows":4,"transport":{"kind":"i2c","address":63,}}"#;
        std::fs::write(&path, contents).unwrap();

        let loaded = Config::load_from(&path);
        let on_disk = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(loaded.is_err());
        assert_eq!(on_disk, contents);
    }
}
