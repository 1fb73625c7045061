use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn scoped_cookie(name: &str, value: &str, ttl_seconds: i64, domain: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), value.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .domain(domain.to_string())
        .max_age(Duration::seconds(ttl_seconds))
        .build()
}

pub fn access_cookie(token: &str, ttl_seconds: i64, domain: &str) -> Cookie<'static> {
    scoped_cookie(ACCESS_COOKIE, token, ttl_seconds, domain)
}

pub fn refresh_cookie(token: &str, ttl_seconds: i64, domain: &str) -> Cookie<'static> {
    scoped_cookie(REFRESH_COOKIE, token, ttl_seconds, domain)
}

/// Host part of the configured CORS origin, used to scope the auth cookies.
pub fn origin_host(origin: &str) -> &str {
    let rest = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(origin);
    rest.split(['/', ':']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_host_strips_scheme_port_and_path() {
        assert_eq!(origin_host("https://app.example.com"), "app.example.com");
        assert_eq!(origin_host("http://localhost:5173"), "localhost");
        assert_eq!(origin_host("https://app.example.com/base"), "app.example.com");
    }

    #[test]
    fn cookies_carry_the_required_attributes() {
        let c = access_cookie("tok", 900, "example.com");
        assert_eq!(c.name(), ACCESS_COOKIE);
        assert_eq!(c.value(), "tok");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.domain(), Some("example.com"));
        assert_eq!(c.max_age(), Some(Duration::seconds(900)));
    }
}
