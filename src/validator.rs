use std::{net::Ipv4Addr, str::FromStr};

/// Checks whether `candidate` is an IPv4 address in canonical dotted-quad form.
///
/// The standard library parser already rejects leading zeros, whitespace, signs, CIDR suffixes
/// and anything with more or fewer than four octets, so this never needs to report *why* an
/// address was rejected.
pub fn validate_ipv4(candidate: &str) -> bool {
    Ipv4Addr::from_str(candidate).is_ok()
}
