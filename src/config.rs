use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::layout::LayoutConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub layout: LayoutTuning,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            layout: LayoutTuning::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("CARTONIZER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse CARTONIZER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("Default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("CARTONIZER_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    eprintln!(
                        "⚠️ CARTONIZER_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    eprintln!(
                        "⚠️ Could not parse CARTONIZER_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for layout resolution and scene assembly.
#[derive(Clone, Debug)]
pub struct LayoutTuning {
    layout: LayoutConfig,
}

impl LayoutTuning {
    const FALLBACK_DIM_VAR: &'static str = "CARTONIZER_LAYOUT_FALLBACK_DIM";
    const CANVAS_VAR: &'static str = "CARTONIZER_LAYOUT_CANVAS";
    const FULLSCREEN_CANVAS_VAR: &'static str = "CARTONIZER_LAYOUT_CANVAS_FULLSCREEN";
    const EXPLODE_GAP_VAR: &'static str = "CARTONIZER_LAYOUT_EXPLODE_GAP";
    const FACE_INSET_VAR: &'static str = "CARTONIZER_LAYOUT_FACE_INSET";
    const LEVEL_CAP_VAR: &'static str = "CARTONIZER_LAYOUT_LEVEL_RENDER_CAP";
    const TOTAL_CAP_VAR: &'static str = "CARTONIZER_LAYOUT_TOTAL_RENDER_CAP";

    fn from_env() -> Self {
        let fallback_dim_cm = load_f64_with_warning(
            Self::FALLBACK_DIM_VAR,
            LayoutConfig::DEFAULT_FALLBACK_DIM_CM,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted fallback dimension changes the empty-input preview",
        );

        let canvas_px = load_f64_with_warning(
            Self::CANVAS_VAR,
            LayoutConfig::DEFAULT_CANVAS_PX,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted canvas size changes on-screen proportions",
        );

        let fullscreen_canvas_px = load_f64_with_warning(
            Self::FULLSCREEN_CANVAS_VAR,
            LayoutConfig::DEFAULT_FULLSCREEN_CANVAS_PX,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted fullscreen canvas size changes on-screen proportions",
        );

        let explode_gap_px = load_f64_with_warning(
            Self::EXPLODE_GAP_VAR,
            LayoutConfig::DEFAULT_EXPLODE_GAP_PX,
            |value| value >= 0.0,
            "must not be negative",
            "Warning: Adjusted exploded-view gap may overlap boxes",
        );

        let face_inset_px = load_f64_with_warning(
            Self::FACE_INSET_VAR,
            LayoutConfig::DEFAULT_FACE_INSET_PX,
            |value| value >= 0.0,
            "must not be negative",
            "Warning: Adjusted face inset may blur cell boundaries",
        );

        let level_render_cap = load_usize_with_warning(
            Self::LEVEL_CAP_VAR,
            LayoutConfig::DEFAULT_LEVEL_RENDER_CAP,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted per-level render cap affects browser load",
        );

        let total_render_cap = load_usize_with_warning(
            Self::TOTAL_CAP_VAR,
            LayoutConfig::DEFAULT_TOTAL_RENDER_CAP,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted total render cap affects browser load",
        );

        let layout = LayoutConfig::builder()
            .fallback_dim_cm(fallback_dim_cm)
            .canvas_px(canvas_px)
            .fullscreen_canvas_px(fullscreen_canvas_px)
            .explode_gap_px(explode_gap_px)
            .face_inset_px(face_inset_px)
            .level_render_cap(level_render_cap)
            .total_render_cap(total_render_cap)
            .build();

        Self { layout }
    }

    /// Returns the configured LayoutConfig.
    pub fn layout_config(&self) -> LayoutConfig {
        self.layout
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    eprintln!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        println!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

fn load_usize_with_warning(
    var_name: &str,
    default: usize,
    validator: impl Fn(usize) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> usize {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) => {
                if !validator(value) {
                    eprintln!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    if value != default {
                        println!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
