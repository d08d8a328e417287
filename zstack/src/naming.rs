//! Output naming and designation ordering.

use crate::time::jd_to_date_token;

/// Filesystem-safe token for a target designation: `"C/2017 K2"` -> `"c2017k2"`.
pub fn desg_to_file(desg: &str) -> String {
    desg.chars()
        .filter(|c| *c != '/' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Sort key that honours a leading multi-digit number, so `"2P" < "10P" < "101P"`.
///
/// Designations without a leading number sort first (number 0), then by the
/// remaining text.
pub fn leading_num_key(desg: &str) -> (u64, &str) {
    let digits = desg.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return (0, desg);
    }
    let number = desg[..digits].parse().unwrap_or(u64::MAX);
    (number, &desg[digits..])
}

/// Whether the target is approaching perihelion (negative heliocentric radial velocity).
pub fn perihelion_tag(rdot: f64) -> &'static str {
    if rdot < 0.0 {
        "pre"
    } else {
        "post"
    }
}

/// Relative path of the composite for one (night, target, filter) group.
///
/// `<d>/<d>-<YYYYMMDD>-<pre|post><rh>-<filter>-ztf-stack.fits`, where the date
/// is the UTC date of `mean_jd` and `rh` has three decimals. Returns `None`
/// when `mean_jd` is not a representable date.
pub fn stack_filename(
    desg: &str,
    mean_jd: f64,
    mean_rh: f64,
    mean_rdot: f64,
    filter: &str,
) -> Option<String> {
    let target = desg_to_file(desg);
    let date = jd_to_date_token(mean_jd)?;
    Some(format!(
        "{target}/{target}-{date}-{tag}{mean_rh:.3}-{filter}-ztf-stack.fits",
        tag = perihelion_tag(mean_rdot),
    ))
}
