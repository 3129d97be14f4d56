//! Parameter-file parsing.
//!
//! Each line starts with a tag identifying what it carries:
//!
//! - `t:chnl_prob,bank_prob,row_prob[,min_con_acc,min_con_noacc]` — thread
//!   channel/bank/row marginals, with the minimum-consecutive run lengths
//!   optionally inlined as trailing fields.
//! - `a:dist,prob,hit_prob,miss_prob,conf_prob,reorder_ns,autoclose_ns,est_serv_ns`
//!   — one reuse-distance entry.
//! - `ca:num/den,num/den,...` — the consecutive-access probability table.
//! - `cn:num/den,num/den,...` — the consecutive-no-access probability table.
//! - `mt:n` — override `min_con_acc` (applied after `t:`, so it wins).
//! - `mn:n` — override `min_con_noacc` (applied after `t:`, so it wins).
//!
//! Unknown tags and malformed fields are rejected outright rather than
//! skipped, since a silently-ignored line would shift every probability
//! table downstream of it.

use crate::error::{ModelError, Result};
use crate::rational::Rational;
use crate::types::{ConsecutiveAccProbs, ConsecutiveNoAccProbs, ReuseDistEntry, ThreadInfo};

fn parse_err(line: &str, why: &str) -> ModelError {
    ModelError::ParamFile(format!("{why}: {line:?}"))
}

fn parse_f64(field: &str, line: &str) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| parse_err(line, "expected a floating-point field"))
}

fn parse_usize(field: &str, line: &str) -> Result<usize> {
    field
        .trim()
        .parse::<usize>()
        .map_err(|_| parse_err(line, "expected a non-negative integer field"))
}

fn parse_rational(field: &str, line: &str) -> Result<Rational> {
    let (num, den) = field
        .trim()
        .split_once('/')
        .ok_or_else(|| parse_err(line, "expected a num/den rational field"))?;
    let num: i64 = num.trim().parse().map_err(|_| parse_err(line, "bad rational numerator"))?;
    let den: i64 = den.trim().parse().map_err(|_| parse_err(line, "bad rational denominator"))?;
    if den == 0 {
        return Err(parse_err(line, "rational denominator must be non-zero"));
    }
    Ok(Rational::new(num, den))
}

/// Parse a full parameter file's contents into one thread's statistics.
pub fn parse_thread_info(contents: &str) -> Result<ThreadInfo> {
    let mut thr_info: Option<ThreadInfo> = None;
    let mut con_acc = ConsecutiveAccProbs::default();
    let mut con_noacc = ConsecutiveNoAccProbs::default();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (tag, rest) = line
            .split_once(':')
            .ok_or_else(|| parse_err(line, "missing tag prefix"))?;

        match tag {
            "t" => {
                let fields: Vec<&str> = rest.split(',').collect();
                if fields.len() < 3 {
                    return Err(parse_err(line, "t: line needs chnl,bank,row probabilities"));
                }
                let chnl_prob = parse_f64(fields[0], line)?;
                let bank_prob = parse_f64(fields[1], line)?;
                let row_prob = parse_f64(fields[2], line)?;
                let min_con_acc = if fields.len() > 3 { parse_usize(fields[3], line)? } else { 1 };
                let min_con_noacc = if fields.len() > 4 { parse_usize(fields[4], line)? } else { 1 };

                thr_info = Some(ThreadInfo {
                    chnl_prob,
                    bank_prob,
                    row_prob,
                    reorder_time_ns: 0.0,
                    autoclose_time_ns: 0.0,
                    est_serv_time_ns: 1.0,
                    half_reorder: false,
                    min_con_acc,
                    min_con_noacc,
                    reuse_dists: Vec::new(),
                });
            }
            "a" => {
                let thr = thr_info
                    .as_mut()
                    .ok_or_else(|| parse_err(line, "a: line given before t: line"))?;
                let fields: Vec<&str> = rest.split(',').collect();
                if fields.len() < 8 {
                    return Err(parse_err(line, "a: line needs 8 comma-separated fields"));
                }
                let dist = parse_usize(fields[0], line)?;
                let prob = parse_f64(fields[1], line)?;
                let hit_prob = parse_f64(fields[2], line)?;
                let miss_prob = parse_f64(fields[3], line)?;
                let conf_prob = parse_f64(fields[4], line)?;
                thr.reorder_time_ns = parse_f64(fields[5], line)?;
                thr.autoclose_time_ns = parse_f64(fields[6], line)?;
                thr.est_serv_time_ns = parse_f64(fields[7], line)?;

                thr.reuse_dists.push(ReuseDistEntry {
                    dist,
                    prob,
                    hit_prob,
                    miss_prob,
                    conf_prob,
                    sequences: Vec::new(),
                });
            }
            "ca" => {
                let mut table = Vec::new();
                for field in rest.split(',') {
                    table.push(parse_rational(field, line)?);
                }
                con_acc.acc_prob = table;
            }
            "cn" => {
                let mut table = Vec::new();
                for field in rest.split(',') {
                    table.push(parse_rational(field, line)?);
                }
                con_noacc.noacc_prob = table;
            }
            "mt" => {
                let thr = thr_info
                    .as_mut()
                    .ok_or_else(|| parse_err(line, "mt: line given before t: line"))?;
                thr.min_con_acc = parse_usize(rest, line)?;
            }
            "mn" => {
                let thr = thr_info
                    .as_mut()
                    .ok_or_else(|| parse_err(line, "mn: line given before t: line"))?;
                thr.min_con_noacc = parse_usize(rest, line)?;
            }
            other => return Err(parse_err(line, &format!("unknown tag {other:?}"))),
        }
    }

    thr_info.ok_or_else(|| ModelError::ParamFile("parameter file has no t: line".to_string()))
}

/// The parsed consecutive-access/no-access tables, kept separate from
/// [`ThreadInfo`] since they're consumed only by [`crate::generator`].
pub fn parse_consecutive_tables(contents: &str) -> Result<(ConsecutiveAccProbs, ConsecutiveNoAccProbs)> {
    let mut con_acc = ConsecutiveAccProbs::default();
    let mut con_noacc = ConsecutiveNoAccProbs::default();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((tag, rest)) = line.split_once(':') else {
            continue;
        };
        match tag {
            "ca" => {
                let mut table = Vec::new();
                for field in rest.split(',') {
                    table.push(parse_rational(field, line)?);
                }
                con_acc.acc_prob = table;
            }
            "cn" => {
                let mut table = Vec::new();
                for field in rest.split(',') {
                    table.push(parse_rational(field, line)?);
                }
                con_noacc.noacc_prob = table;
            }
            _ => {}
        }
    }

    Ok((con_acc, con_noacc))
}
