// Copyright (C) 2023-2025 FeatureHub Contributors (https://www.featurehub.io/)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The typed predicate engine. Each function evaluates one conditional over
//! a context value and a list of option literals, both parsed under the
//! attribute's declared type. Parse and coercion failures surface as errors
//! so the evaluator can log them and treat the attribute as not matched.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;
use semver::Version;
use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime};

use crate::commons::{AttributeType, Conditional};
use crate::error::Error;
use crate::responses::StrategyAttribute;

/// Dispatches to the predicate for the attribute's declared type.
/// Unrecognized types never match.
pub fn match_attribute(attribute: &StrategyAttribute, value: &Value) -> Result<bool, Error> {
    match &attribute.attribute_type {
        AttributeType::Boolean => boolean(&attribute.conditional, &attribute.values, value),
        AttributeType::String => string(&attribute.conditional, &attribute.values, value),
        AttributeType::Number => number(&attribute.conditional, &attribute.values, value),
        AttributeType::Date => date(&attribute.conditional, &attribute.values, value),
        AttributeType::Datetime => datetime(&attribute.conditional, &attribute.values, value),
        AttributeType::SemanticVersion => {
            semantic_version(&attribute.conditional, &attribute.values, value)
        }
        AttributeType::IpAddress => ip_address(&attribute.conditional, &attribute.values, value),
        AttributeType::Other(_) => Ok(false),
    }
}

fn assert_str(value: &Value) -> Result<&str, Error> {
    value
        .as_str()
        .ok_or_else(|| Error::invalid_type(format!("unable to assert value ({value}) as a string")))
}

fn assert_f64(value: &Value) -> Result<f64, Error> {
    value
        .as_f64()
        .ok_or_else(|| Error::invalid_type(format!("unable to assert value ({value}) as a number")))
}

fn assert_bool(value: &Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        // Well-known context fields travel as strings.
        Value::String(s) => s.parse::<bool>().map_err(|_| {
            Error::invalid_type(format!("unable to assert value ({s}) as a boolean"))
        }),
        other => Err(Error::invalid_type(format!(
            "unable to assert value ({other}) as a boolean"
        ))),
    }
}

/// BOOLEAN supports EQUALS and NOT_EQUALS only.
pub fn boolean(conditional: &Conditional, options: &[Value], value: &Value) -> Result<bool, Error> {
    let value = assert_bool(value)?;
    let options = options
        .iter()
        .map(assert_bool)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match conditional {
        Conditional::Equals => options.iter().any(|option| value == *option),
        Conditional::NotEquals => !options.iter().any(|option| value == *option),
        _ => false,
    })
}

pub fn string(conditional: &Conditional, options: &[Value], value: &Value) -> Result<bool, Error> {
    let value = assert_str(value)?;
    let options = options
        .iter()
        .map(assert_str)
        .collect::<Result<Vec<_>, _>>()?;

    if value.is_empty() {
        return Ok(false);
    }

    let matched = match conditional {
        Conditional::Equals | Conditional::Includes => {
            options.iter().any(|option| value == *option)
        }
        Conditional::NotEquals | Conditional::Excludes => {
            !options.iter().any(|option| value == *option)
        }
        Conditional::Less => options.iter().all(|option| value < *option),
        Conditional::LessEquals => options.iter().all(|option| value <= *option),
        Conditional::Greater => options.iter().all(|option| value > *option),
        Conditional::GreaterEquals => options.iter().all(|option| value >= *option),
        Conditional::StartsWith => options.iter().any(|option| value.starts_with(option)),
        Conditional::EndsWith => options.iter().any(|option| value.ends_with(option)),
        Conditional::Regex => {
            for option in options {
                // Full-match semantics: the pattern must cover the whole value.
                let pattern = Regex::new(&format!("^(?:{option})$"))
                    .map_err(|error| Error::invalid_type(error.to_string()))?;
                if pattern.is_match(value) {
                    return Ok(true);
                }
            }
            false
        }
        _ => false,
    };

    Ok(matched)
}

/// NUMBER coerces the context value from any integer or floating wire shape
/// to an f64. Ordering conditionals require the relation to hold against
/// every option.
pub fn number(conditional: &Conditional, options: &[Value], value: &Value) -> Result<bool, Error> {
    let value = assert_f64(value)?;
    let options = options
        .iter()
        .map(assert_f64)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(evaluate_ordered(conditional, &options, &value))
}

pub fn date(conditional: &Conditional, options: &[Value], value: &Value) -> Result<bool, Error> {
    let parse = |raw: &Value| -> Result<Date, Error> {
        let raw = assert_str(raw)?;
        Date::parse(raw, &Iso8601::DEFAULT)
            .map_err(|error| Error::invalid_type(format!("unable to parse date ({raw}): {error}")))
    };

    let value = parse(value)?;
    let options = options.iter().map(parse).collect::<Result<Vec<_>, _>>()?;

    Ok(evaluate_ordered(conditional, &options, &value))
}

pub fn datetime(
    conditional: &Conditional,
    options: &[Value],
    value: &Value,
) -> Result<bool, Error> {
    let parse = |raw: &Value| -> Result<OffsetDateTime, Error> {
        let raw = assert_str(raw)?;
        OffsetDateTime::parse(raw, &Rfc3339).map_err(|error| {
            Error::invalid_type(format!("unable to parse datetime ({raw}): {error}"))
        })
    };

    let value = parse(value)?;
    let options = options.iter().map(parse).collect::<Result<Vec<_>, _>>()?;

    Ok(evaluate_ordered(conditional, &options, &value))
}

/// SEMANTIC_VERSION compares by semver precedence.
pub fn semantic_version(
    conditional: &Conditional,
    options: &[Value],
    value: &Value,
) -> Result<bool, Error> {
    let parse = |raw: &Value| -> Result<Version, Error> {
        let raw = assert_str(raw)?;
        Version::parse(raw).map_err(|error| {
            Error::invalid_type(format!("unable to parse semantic version ({raw}): {error}"))
        })
    };

    let value = parse(value)?;
    let options = options.iter().map(parse).collect::<Result<Vec<_>, _>>()?;

    Ok(evaluate_ordered(conditional, &options, &value))
}

/// The shared conditional table for totally ordered types: equality against
/// any option, ordering against every option.
fn evaluate_ordered<T: PartialOrd>(conditional: &Conditional, options: &[T], value: &T) -> bool {
    match conditional {
        Conditional::Equals | Conditional::Includes => {
            options.iter().any(|option| value == option)
        }
        Conditional::NotEquals | Conditional::Excludes => {
            !options.iter().any(|option| value == option)
        }
        Conditional::Less => options.iter().all(|option| value < option),
        Conditional::LessEquals => options.iter().all(|option| value <= option),
        Conditional::Greater => options.iter().all(|option| value > option),
        Conditional::GreaterEquals => options.iter().all(|option| value >= option),
        _ => false,
    }
}

/// Accepts a plain address ("1.2.3.4") or CIDR form ("10.1.2.3/16"), keeping
/// the host address when a prefix is present.
fn parse_ip(value: &str) -> Result<IpAddr, Error> {
    if value.contains('/') {
        let net: IpNet = value
            .parse()
            .map_err(|_| Error::invalid_type(format!("unknown ip: {value}")))?;
        return Ok(net.addr());
    }

    value
        .parse::<IpAddr>()
        .map_err(|_| Error::invalid_type(format!("unknown ip: {value}")))
}

/// IP_ADDRESS equality compares the canonicalized context address against
/// option strings exactly as the server sent them; INCLUDES and EXCLUDES
/// parse each option as a CIDR network and test containment.
pub fn ip_address(
    conditional: &Conditional,
    options: &[Value],
    value: &Value,
) -> Result<bool, Error> {
    let raw = assert_str(value)?;
    if raw.is_empty() {
        return Ok(false);
    }
    let ip = parse_ip(raw)?;
    let canonical = ip.to_string();

    let options = options
        .iter()
        .map(assert_str)
        .collect::<Result<Vec<_>, _>>()?;

    let matched = match conditional {
        Conditional::Equals => options.iter().any(|option| canonical == *option),
        Conditional::NotEquals => !options.iter().any(|option| canonical == *option),
        Conditional::Includes => {
            let mut contained = false;
            for option in &options {
                let Ok(net) = option.parse::<IpNet>() else {
                    return Ok(false);
                };
                if net.contains(&ip) {
                    contained = true;
                    break;
                }
            }
            contained
        }
        Conditional::Excludes => {
            for option in &options {
                let Ok(net) = option.parse::<IpNet>() else {
                    return Ok(false);
                };
                if net.contains(&ip) {
                    return Ok(false);
                }
            }
            true
        }
        _ => false,
    };

    Ok(matched)
}
