//! Unit-aware value formatting keyed by the unit ids stored in dataset field metadata.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

use super::{default_mantissa, format_decimal, is_number_type, MAX_SAFE_INTEGER};
use crate::query::DatasetField;

/// Per-field formatter table, merged from every result's field metadata.
pub type FieldValueFormatters = IndexMap<String, ValueFormat>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedValue {
    pub prefix: Option<String>,
    pub text: String,
    pub suffix: Option<String>,
}

impl FormattedValue {
    fn text(text: String) -> Self {
        Self {
            prefix: None,
            text,
            suffix: None,
        }
    }

    fn with_suffix(text: String, suffix: &str) -> Self {
        Self {
            prefix: None,
            text,
            suffix: Some(suffix.to_string()),
        }
    }
}

impl fmt::Display for FormattedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            self.text,
            self.suffix.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub decimals: Option<i32>,
    pub scaled_decimals: Option<i32>,
    pub skip_scale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FormatKind {
    None,
    Scaled {
        factor: f64,
        units: &'static [&'static str],
    },
    Percent,
    PercentUnit,
    Currency(&'static str),
    SimpleCount(&'static str),
    BinarySi {
        unit: &'static str,
        offset: usize,
    },
    DecimalSi {
        unit: &'static str,
        offset: usize,
    },
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    DateTimeIso,
}

/// A named unit formatter. Serializes as its id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueFormat {
    pub id: &'static str,
    pub name: &'static str,
    kind: FormatKind,
}

const SHORT_UNITS: &[&str] = &["", " K", " Mil", " Bil", " Tri", " Quadr", " Quint", " Sext", " Sept"];
const COUNT_UNITS: &[&str] = &["", "K", "M", "B", "T"];
const BINARY_PREFIXES: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];
const DECIMAL_PREFIXES: &[&str] = &["", "k", "M", "G", "T", "P", "E", "Z", "Y"];

const fn format(id: &'static str, name: &'static str, kind: FormatKind) -> ValueFormat {
    ValueFormat { id, name, kind }
}

const fn binary(id: &'static str, name: &'static str, unit: &'static str, offset: usize) -> ValueFormat {
    format(id, name, FormatKind::BinarySi { unit, offset })
}

const fn decimal(id: &'static str, name: &'static str, unit: &'static str, offset: usize) -> ValueFormat {
    format(id, name, FormatKind::DecimalSi { unit, offset })
}

const fn count(id: &'static str, name: &'static str) -> ValueFormat {
    format(id, name, FormatKind::SimpleCount(id))
}

impl ValueFormat {
    pub const NONE: ValueFormat = format("none", "none", FormatKind::None);
    pub const SHORT: ValueFormat = format(
        "short",
        "short",
        FormatKind::Scaled {
            factor: 1000.0,
            units: SHORT_UNITS,
        },
    );

    /// Every known unit, grouped the way a unit picker lists them.
    pub const ALL: &'static [ValueFormat] = &[
        // Misc
        ValueFormat::NONE,
        ValueFormat::SHORT,
        format("percent100", "percent (0-100)", FormatKind::Percent),
        format("percent", "percent (0.0-1.0)", FormatKind::PercentUnit),
        // Currency
        format("curusd", "Dollars ($)", FormatKind::Currency("$")),
        format("curgbp", "Pounds (£)", FormatKind::Currency("£")),
        format("cureur", "Euro (€)", FormatKind::Currency("€")),
        format("curbtc", "Bitcoin (฿)", FormatKind::Currency("฿")),
        // Data (IEC)
        binary("bits", "bits(IEC)", "b", 0),
        binary("bytes", "bytes(IEC)", "B", 0),
        binary("kbytes", "kibibytes", "B", 1),
        binary("mbytes", "mebibytes", "B", 2),
        binary("gbytes", "gibibytes", "B", 3),
        binary("tbytes", "tebibytes", "B", 4),
        binary("pbytes", "pebibytes", "B", 5),
        // Data (Metric)
        decimal("decbits", "bits(Metric)", "b", 0),
        decimal("decbytes", "bytes(Metric)", "B", 0),
        decimal("deckbytes", "kilobytes", "B", 1),
        decimal("decmbytes", "megabytes", "B", 2),
        decimal("decgbytes", "gigabytes", "B", 3),
        decimal("dectbytes", "terabytes", "B", 4),
        decimal("decpbytes", "petabytes", "B", 5),
        // Data rate
        decimal("pps", "packets/sec", "pps", 0),
        decimal("bps", "bits/sec", "bps", 0),
        decimal("Bps", "bytes/sec", "B/s", 0),
        decimal("KBs", "kilobytes/sec", "B/s", 1),
        decimal("Kbits", "kilobits/sec", "bps", 1),
        decimal("MBs", "megabytes/sec", "B/s", 2),
        decimal("Mbits", "megabits/sec", "bps", 2),
        decimal("GBs", "gigabytes/sec", "B/s", 3),
        decimal("Gbits", "gigabits/sec", "bps", 3),
        decimal("TBs", "terabytes/sec", "B/s", 4),
        decimal("Tbits", "terabits/sec", "bps", 4),
        decimal("PBs", "petabytes/sec", "B/s", 5),
        decimal("Pbits", "petabits/sec", "bps", 5),
        // Datetime
        format("datetimeiso", "YYYY-MM-DD HH:mm:ss", FormatKind::DateTimeIso),
        // Time
        decimal("hertz", "Hertz (1/s)", "Hz", 0),
        format("ns", "nanoseconds (ns)", FormatKind::Nanoseconds),
        format("µs", "microseconds (µs)", FormatKind::Microseconds),
        format("ms", "milliseconds (ms)", FormatKind::Milliseconds),
        format("secs", "seconds (s)", FormatKind::Seconds),
        format("mins", "minutes (m)", FormatKind::Minutes),
        format("hours", "hours (h)", FormatKind::Hours),
        format("days", "days (d)", FormatKind::Days),
        // Throughput
        count("cps", "counts/sec (cps)"),
        count("ops", "ops/sec (ops)"),
        count("reqps", "requests/sec (rps)"),
        count("rps", "reads/sec (rps)"),
        count("wps", "writes/sec (wps)"),
        count("iops", "I/O ops/sec (iops)"),
        count("cpm", "counts/min (cpm)"),
        count("opm", "ops/min (opm)"),
        count("reqpm", "requests/min (rps)"),
        count("rpm", "reads/min (rpm)"),
        count("wpm", "writes/min (wpm)"),
    ];

    pub fn from_id(id: &str) -> Option<ValueFormat> {
        Self::ALL.iter().find(|format| format.id == id).copied()
    }

    pub fn format(&self, value: f64, options: &FormatOptions) -> FormattedValue {
        match self.kind {
            FormatKind::None => FormattedValue::text(super::js_number(value)),
            FormatKind::Scaled { factor, units } => scaled_units(value, factor, units, options),
            FormatKind::Percent => FormattedValue::with_suffix(to_fixed(value, options.decimals), "%"),
            FormatKind::PercentUnit => {
                FormattedValue::with_suffix(to_fixed(value * 100.0, options.decimals), "%")
            }
            FormatKind::Currency(symbol) => {
                let mut scaled = scaled_units(value, 1000.0, COUNT_UNITS, options);
                scaled.prefix = Some(symbol.to_string());
                scaled
            }
            FormatKind::SimpleCount(symbol) => {
                let mut scaled = scaled_units(value, 1000.0, COUNT_UNITS, options);
                let suffix = scaled.suffix.take().unwrap_or_default();
                scaled.suffix = Some(format!("{} {}", suffix, symbol));
                scaled
            }
            FormatKind::BinarySi { unit, offset } => {
                let units = prefixed_units(BINARY_PREFIXES, unit, offset);
                scaled_units(value, 1024.0, &units[..], options)
            }
            FormatKind::DecimalSi { unit, offset } => {
                let units = prefixed_units(DECIMAL_PREFIXES, unit, offset);
                scaled_units(value, 1000.0, &units[..], options)
            }
            FormatKind::Nanoseconds => to_nanoseconds(value, options),
            FormatKind::Microseconds => to_microseconds(value, options),
            FormatKind::Milliseconds => to_milliseconds(value, options),
            FormatKind::Seconds => to_seconds(value, options),
            FormatKind::Minutes => to_minutes(value, options),
            FormatKind::Hours => to_hours(value, options),
            FormatKind::Days => to_days(value, options),
            FormatKind::DateTimeIso => FormattedValue::text(date_time_as_iso(value)),
        }
    }
}

impl Serialize for ValueFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id)
    }
}

fn prefixed_units(prefixes: &[&str], unit: &str, offset: usize) -> Vec<String> {
    prefixes
        .iter()
        .skip(offset)
        .map(|prefix| format!(" {}{}", prefix, unit))
        .collect()
}

fn to_fixed(value: f64, decimals: Option<i32>) -> String {
    if value.is_infinite() {
        return format_decimal(value, 0);
    }

    let digits = match decimals {
        Some(d) => d.clamp(0, 20) as usize,
        None => default_mantissa(value),
    };

    format_decimal(value, digits)
}

fn to_fixed_scaled(
    value: f64,
    decimals: Option<i32>,
    scaled_decimals: Option<i32>,
    additional_decimals: i32,
    ext: &str,
) -> FormattedValue {
    match scaled_decimals {
        None => FormattedValue::with_suffix(to_fixed(value, decimals), ext),
        Some(scaled) => {
            FormattedValue::with_suffix(to_fixed(value, Some(scaled + additional_decimals)), ext)
        }
    }
}

/// Divides by `factor` until the magnitude drops below it, picking the matching unit.
fn scaled_units<S: AsRef<str>>(value: f64, factor: f64, units: &[S], options: &FormatOptions) -> FormattedValue {
    if !value.is_finite() {
        return FormattedValue::text(format_decimal(value, 0));
    }

    let mut size = value;
    let mut decimals = options.decimals;
    let mut steps = 0usize;

    while !options.skip_scale && size.abs() >= factor {
        steps += 1;
        size /= factor;

        if steps >= units.len() {
            return FormattedValue::text("NA".to_string());
        }
    }

    if steps > 0 {
        if let Some(scaled) = options.scaled_decimals {
            decimals = Some(scaled + steps as i32 * 3);
        }
    }

    let suffix = units.get(steps).map(|u| u.as_ref()).unwrap_or("");
    FormattedValue::with_suffix(to_fixed(size, decimals), suffix)
}

/// Walks `(limit, divisor, additional_decimals, suffix)` steps and scales by the first
/// whose limit exceeds the magnitude.
fn step_units(
    value: f64,
    options: &FormatOptions,
    base_suffix: &str,
    base_limit: f64,
    steps: &[(f64, f64, i32, &str)],
    last: (f64, i32, &str),
) -> FormattedValue {
    if value.abs() < base_limit {
        return FormattedValue::with_suffix(to_fixed(value, options.decimals), base_suffix);
    }

    for &(limit, divisor, additional, suffix) in steps {
        if value.abs() < limit {
            return to_fixed_scaled(value / divisor, options.decimals, options.scaled_decimals, additional, suffix);
        }
    }

    let (divisor, additional, suffix) = last;
    to_fixed_scaled(value / divisor, options.decimals, options.scaled_decimals, additional, suffix)
}

fn to_nanoseconds(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(
        value,
        options,
        " ns",
        1000.0,
        &[
            (1e6, 1e3, 3, " µs"),
            (1e9, 1e6, 6, " ms"),
            (6e10, 1e9, 9, " s"),
            (3.6e12, 6e10, 12, " min"),
            (8.64e13, 3.6e12, 13, " hour"),
        ],
        (8.64e13, 14, " day"),
    )
}

fn to_microseconds(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(value, options, " µs", 1000.0, &[(1e6, 1e3, 3, " ms")], (1e6, 6, " s"))
}

fn to_milliseconds(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(
        value,
        options,
        " ms",
        1000.0,
        &[
            (60_000.0, 1000.0, 3, " s"),
            (3_600_000.0, 60_000.0, 5, " min"),
            (86_400_000.0, 3_600_000.0, 7, " hour"),
            (31_536_000_000.0, 86_400_000.0, 8, " day"),
        ],
        (31_536_000_000.0, 10, " year"),
    )
}

fn to_seconds(value: f64, options: &FormatOptions) -> FormattedValue {
    let sub_second = options
        .scaled_decimals
        .zip(options.decimals)
        .map(|(scaled, decimals)| scaled - decimals);

    if value.abs() < 0.000_001 {
        return to_fixed_scaled(value * 1e9, options.decimals, sub_second, -9, " ns");
    }
    if value.abs() < 0.001 {
        return to_fixed_scaled(value * 1e6, options.decimals, sub_second, -6, " µs");
    }
    if value.abs() < 1.0 {
        return to_fixed_scaled(value * 1e3, options.decimals, sub_second, -3, " ms");
    }

    step_units(
        value,
        options,
        " s",
        60.0,
        &[
            (3600.0, 60.0, 1, " min"),
            (86_400.0, 3600.0, 4, " hour"),
            (604_800.0, 86_400.0, 5, " day"),
            (31_536_000.0, 604_800.0, 6, " week"),
        ],
        (3.15569e7, 7, " year"),
    )
}

fn to_minutes(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(
        value,
        options,
        " min",
        60.0,
        &[
            (1440.0, 60.0, 2, " hour"),
            (10_080.0, 1440.0, 3, " day"),
            (604_800.0, 10_080.0, 4, " week"),
        ],
        (5.25948e5, 5, " year"),
    )
}

fn to_hours(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(
        value,
        options,
        " hour",
        24.0,
        &[(168.0, 24.0, 2, " day"), (8760.0, 168.0, 3, " week")],
        (8760.0, 4, " year"),
    )
}

fn to_days(value: f64, options: &FormatOptions) -> FormattedValue {
    step_units(value, options, " day", 7.0, &[(365.0, 7.0, 2, " week")], (365.0, 3, " year"))
}

fn date_time_as_iso(value: f64) -> String {
    if !value.is_finite() || value.abs() > MAX_SAFE_INTEGER {
        return String::new();
    }

    DateTime::<Utc>::from_timestamp_millis(value as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Maps each numeric field to its unit formatter, `short` when the unit is unknown.
pub fn fields_meta_to_value_formatters(fields: &[DatasetField]) -> FieldValueFormatters {
    fields
        .iter()
        .filter(|field| is_number_type(&field.field_type))
        .map(|field| {
            let format = ValueFormat::from_id(&field.unit).unwrap_or(ValueFormat::SHORT);
            (field.name.clone(), format)
        })
        .collect()
}
