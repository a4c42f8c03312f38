use ircrelay::{BotConfig, Error};

#[test]
fn partial_toml_fills_defaults() {
    let config: BotConfig = toml::from_str(
        r##"
        server_addr = "irc.libera.chat:6697"
        nick = "relaybot"
        channels = ["#rust", "#tokio"]
        "##,
    )
    .unwrap();

    assert_eq!(config.server_addr, "irc.libera.chat:6697");
    assert_eq!(config.nick, "relaybot");
    assert_eq!(config.user, "relay");
    assert_eq!(config.channels, vec!["#rust", "#tokio"]);
    assert_eq!(config.event_capacity, 1);
    assert!(config.password.is_none());
    assert!(config.use_tls());
    assert!(config.validate().is_ok());
}

#[test]
fn toml_with_password_and_capacity() {
    let config: BotConfig = toml::from_str(
        r##"
        server_addr = "127.0.0.1:6667"
        nick = "relay"
        password = "letmein"
        event_capacity = 16
        tls = true
        "##,
    )
    .unwrap();

    assert_eq!(config.password.as_deref(), Some("letmein"));
    assert_eq!(config.event_capacity, 16);
    assert!(config.use_tls());
}

#[test]
fn zero_capacity_rejected() {
    let config: BotConfig = toml::from_str("event_capacity = 0").unwrap();
    assert!(matches!(
        config.validate(),
        Err(Error::Config(msg)) if msg.contains("event_capacity")
    ));
}

#[test]
fn serializes_back_to_toml() {
    let config = BotConfig::new("irc.test:6667", "relay", &["#a"]).with_password("pw");
    let text = toml::to_string(&config).unwrap();
    let parsed: BotConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
