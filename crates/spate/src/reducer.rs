//! Pure aggregators over a finite, non-empty sample. Grounded on the
//! vendored `reducer` package: `Max`/`Min`/`Avg`/`Sum` all fold from index 1
//! into `data[0]`; empty input is a hard error.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot reduce an empty sequence")]
pub struct EmptySequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Max,
    Min,
    Avg,
    Sum,
}

pub fn reduce(method: Method, data: &[f64]) -> Result<f64, EmptySequence> {
    match method {
        Method::Max => max(data),
        Method::Min => min(data),
        Method::Avg => avg(data),
        Method::Sum => sum(data),
    }
}

pub fn max(data: &[f64]) -> Result<f64, EmptySequence> {
    let (first, rest) = data.split_first().ok_or(EmptySequence)?;
    Ok(rest.iter().fold(*first, |acc, v| acc.max(*v)))
}

pub fn min(data: &[f64]) -> Result<f64, EmptySequence> {
    let (first, rest) = data.split_first().ok_or(EmptySequence)?;
    Ok(rest.iter().fold(*first, |acc, v| acc.min(*v)))
}

pub fn sum(data: &[f64]) -> Result<f64, EmptySequence> {
    let (first, rest) = data.split_first().ok_or(EmptySequence)?;
    Ok(rest.iter().fold(*first, |acc, v| acc + v))
}

pub fn avg(data: &[f64]) -> Result<f64, EmptySequence> {
    let total = sum(data)?;
    Ok(total / data.len() as f64)
}
