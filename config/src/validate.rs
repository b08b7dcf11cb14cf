//! Per-section validators.
//!
//! Each validator looks at its own section only and reports every problem it
//! finds, so one broken reporter never hides the problems of another.

use crate::{
    sections::{
        ConfigTree,
        MonitorServerSection,
        ReporterSection,
        UdpServerSection,
    },
    settings::{
        BufferPolicy,
        Extra,
        MonitorServerConfig,
        OverflowPolicy,
        ReporterConfig,
        ReporterKind,
        Thresholds,
        UdpServerConfig,
    },
    Problem,
};
use std::time::Duration;
use url::Url;

struct Checker {
    section: &'static str,
    problems: Vec<Problem>,
}

impl Checker {
    fn new(section: &'static str) -> Self {
        Self {
            section,
            problems: Vec::new(),
        }
    }

    fn require<T: Clone>(&mut self, field: &'static str, value: &Option<T>) -> Option<T> {
        if value.is_none() {
            self.problems.push(Problem::Missing {
                section: self.section,
                field,
            });
        }
        value.clone()
    }

    fn invalid(&mut self, field: &'static str, reason: impl ToString) {
        self.problems.push(Problem::Invalid {
            section: self.section,
            field,
            reason: reason.to_string(),
        });
    }

    fn positive_duration(&mut self, field: &'static str, value: Option<f64>, unit: Duration) -> Option<Duration> {
        let value = value?;
        if !value.is_finite() || value <= 0.0 {
            self.invalid(field, format!("expected a positive number, got {value}"));
            return None;
        }
        match Duration::try_from_secs_f64(value * unit.as_secs_f64()) {
            Ok(duration) if duration.is_zero() => {
                self.invalid(field, format!("{value} is below the timer resolution"));
                None
            }
            Ok(duration) => Some(duration),
            Err(_) => {
                self.invalid(field, format!("{value} is out of range"));
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, Vec<Problem>> {
        match value {
            Some(value) if self.problems.is_empty() => Ok(value),
            _ => Err(self.problems),
        }
    }
}

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);

pub(crate) fn udp_server(section: Option<&UdpServerSection>, extra: Extra) -> Result<UdpServerConfig, Vec<Problem>> {
    let mut check = Checker::new(ConfigTree::UDP_SERVER);
    let section = section.cloned().unwrap_or_default();
    let host = check.require("host", &section.host);
    let port = check.require("port", &section.port);
    let buffer_size = check.require("buffer_size", &section.buffer_size);
    if buffer_size == Some(0) {
        check.invalid("buffer_size", "must be greater than zero");
    }

    let config = match (host, port, buffer_size) {
        (Some(host), Some(port), Some(buffer_size)) => Some(UdpServerConfig {
            host,
            port,
            buffer_size,
            extra,
        }),
        _ => None,
    };
    check.finish(config)
}

pub(crate) fn monitor_server(
    section: Option<&MonitorServerSection>,
    extra: Extra,
) -> Result<MonitorServerConfig, Vec<Problem>> {
    let mut check = Checker::new(ConfigTree::MONITOR_SERVER);
    let section = section.cloned().unwrap_or_default();
    let url = check
        .require("url", &section.url)
        .and_then(|url| match Url::parse(&url) {
            Ok(url) => Some(url),
            Err(err) => {
                check.invalid("url", format!("{url:?}: {err}"));
                None
            }
        });
    let username = check.require("username", &section.username);
    let password = check.require("password", &section.password);
    let service_host = check.require("service_host", &section.service_host);
    let req_timeout = check.require("req_timeout", &section.req_timeout);
    let req_timeout = check.positive_duration("req_timeout", req_timeout, SECOND);

    let config = match (url, username, password, service_host, req_timeout) {
        (Some(url), Some(username), Some(password), Some(service_host), Some(req_timeout)) => {
            Some(MonitorServerConfig {
                url,
                username,
                password,
                service_host,
                req_timeout,
                extra,
            })
        }
        _ => None,
    };
    check.finish(config)
}

pub(crate) fn reporter(
    kind: ReporterKind,
    section: Option<&ReporterSection>,
    extra: Extra,
) -> Result<ReporterConfig, Vec<Problem>> {
    let mut check = Checker::new(kind.section());
    let section = section.cloned().unwrap_or_default();
    match check.require("enabled", &section.enabled) {
        None => Err(check.problems),
        Some(false) => Ok(disabled_reporter(kind, section, extra)),
        Some(true) => enabled_reporter(kind, section, extra, check),
    }
}

/// A disabled reporter only needs its `enabled` flag; whatever else is usable is kept.
fn disabled_reporter(kind: ReporterKind, section: ReporterSection, extra: Extra) -> ReporterConfig {
    let to_duration = |value: Option<f64>, unit: Duration| {
        value
            .filter(|v| v.is_finite() && *v > 0.0)
            .and_then(|v| Duration::try_from_secs_f64(v * unit.as_secs_f64()).ok())
            .filter(|duration| !duration.is_zero())
    };
    ReporterConfig {
        kind,
        enabled: false,
        tlm_type: section.tlm_type.unwrap_or_default(),
        frequency: to_duration(section.frequency, MINUTE).unwrap_or_default(),
        thresholds: section
            .warning_t
            .zip(section.critical_t)
            .map(|(warning, critical)| Thresholds { warning, critical }),
        req_timeout: to_duration(section.req_timeout, SECOND),
        member_urls: section
            .member_urls
            .unwrap_or_default()
            .iter()
            .filter_map(|url| Url::parse(url).ok())
            .collect(),
        sub_tlms: section.sub_tlms.unwrap_or_default(),
        probe_interval: to_duration(section.probe_interval, SECOND).unwrap_or(ReporterConfig::DEFAULT_PROBE_INTERVAL),
        buffer: BufferPolicy::Unbounded,
        extra,
    }
}

fn enabled_reporter(
    kind: ReporterKind,
    section: ReporterSection,
    extra: Extra,
    mut check: Checker,
) -> Result<ReporterConfig, Vec<Problem>> {
    let tlm_type = check.require("tlm_type", &section.tlm_type);
    if tlm_type.as_ref().is_some_and(|tags| tags.is_empty()) {
        check.invalid("tlm_type", "at least one telemetry type is required");
    }

    let frequency = check.require("frequency", &section.frequency);
    let frequency = check.positive_duration("frequency", frequency, MINUTE);

    let thresholds = match kind {
        ReporterKind::AvisoRest | ReporterKind::AvisoAuth => {
            let warning = check.require("warning_t", &section.warning_t);
            let critical = check.require("critical_t", &section.critical_t);
            warning
                .zip(critical)
                .map(|(warning, critical)| Thresholds { warning, critical })
        }
        ReporterKind::Etcd => match (section.warning_t, section.critical_t) {
            (Some(warning), Some(critical)) => Some(Thresholds { warning, critical }),
            (None, None) => None,
            (None, Some(_)) => {
                check.require("warning_t", &section.warning_t);
                None
            }
            (Some(_), None) => {
                check.require("critical_t", &section.critical_t);
                None
            }
        },
    };
    if let Some(thresholds) = thresholds {
        if !thresholds.warning.is_finite() || !thresholds.critical.is_finite() {
            check.invalid("warning_t", "thresholds must be finite numbers");
        } else if thresholds.warning > thresholds.critical {
            check.invalid(
                "warning_t",
                format!(
                    "warning threshold {} is above critical threshold {}",
                    thresholds.warning, thresholds.critical
                ),
            );
        }
    }

    let (req_timeout, member_urls) = match kind {
        ReporterKind::Etcd => {
            let req_timeout = check.require("req_timeout", &section.req_timeout);
            let req_timeout = check.positive_duration("req_timeout", req_timeout, SECOND);
            let urls = check.require("member_urls", &section.member_urls).unwrap_or_default();
            if section.member_urls.is_some() && urls.is_empty() {
                check.invalid("member_urls", "at least one member url is required");
            }
            let mut member_urls = Vec::with_capacity(urls.len());
            for url in urls {
                match Url::parse(&url) {
                    Ok(url) => member_urls.push(url),
                    Err(err) => check.invalid("member_urls", format!("{url:?}: {err}")),
                }
            }
            (req_timeout, member_urls)
        }
        ReporterKind::AvisoRest | ReporterKind::AvisoAuth => {
            (check.positive_duration("req_timeout", section.req_timeout, SECOND), Vec::new())
        }
    };

    let probe_interval = check
        .positive_duration("probe_interval", section.probe_interval, SECOND)
        .unwrap_or(ReporterConfig::DEFAULT_PROBE_INTERVAL);

    let buffer = match (section.overflow_policy.unwrap_or_default(), section.buffer_capacity) {
        (OverflowPolicy::Unbounded, _) => BufferPolicy::Unbounded,
        (_, None) => {
            check.require("buffer_capacity", &section.buffer_capacity);
            BufferPolicy::Unbounded
        }
        (_, Some(0)) => {
            check.invalid("buffer_capacity", "must be greater than zero");
            BufferPolicy::Unbounded
        }
        (OverflowPolicy::DropOldest, Some(capacity)) => BufferPolicy::DropOldest { capacity },
        (OverflowPolicy::DropNewest, Some(capacity)) => BufferPolicy::DropNewest { capacity },
    };

    let config = match (tlm_type, frequency) {
        (Some(tlm_type), Some(frequency)) => Some(ReporterConfig {
            kind,
            enabled: true,
            tlm_type,
            frequency,
            thresholds,
            req_timeout,
            member_urls,
            sub_tlms: section.sub_tlms.unwrap_or_default(),
            probe_interval,
            buffer,
            extra,
        }),
        _ => None,
    };
    check.finish(config)
}
