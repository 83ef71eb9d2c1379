use crate::grammar::{LaunchfileParser, Rule};
use kickoff_core::{
    KickoffError, LaunchPlan, Readiness, Result, Target, DEFAULT_BANNER, DEFAULT_COMPLETION,
};
use pest::iterators::Pair;
use pest::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// A value on the right-hand side of `field: value;`
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Duration(Duration),
    Number(u64),
    Bool(bool),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Duration(_) => "duration",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
        }
    }
}

/// Parse a Launchfile string into a LaunchPlan
pub fn parse_launchfile(input: &str) -> Result<LaunchPlan> {
    let mut pairs = LaunchfileParser::parse(Rule::file, input)
        .map_err(|e| KickoffError::ParseError(format!("Parse error: {}", e)))?;

    let file_pair = pairs
        .next()
        .ok_or_else(|| KickoffError::ParseError("Empty Launchfile".to_string()))?;

    let launcher_pair = file_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::launcher)
        .ok_or_else(|| KickoffError::ParseError("No launcher block found in file".to_string()))?;

    let plan = parse_launcher(launcher_pair)?;
    validate_plan(&plan)?;
    Ok(plan)
}

fn parse_launcher(pair: Pair<Rule>) -> Result<LaunchPlan> {
    let mut plan = LaunchPlan {
        name: "default".to_string(),
        banner: DEFAULT_BANNER.to_string(),
        completion: DEFAULT_COMPLETION.to_string(),
        code_page: None,
        hold: true,
        wait_for_key: true,
        terminal: None,
        targets: Vec::new(),
    };

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::setting => {
                let (field, value) = parse_setting(inner_pair)?;
                match field.as_str() {
                    "name" => plan.name = expect_string(&field, value)?,
                    "banner" => plan.banner = expect_string(&field, value)?,
                    "completion" => plan.completion = expect_string(&field, value)?,
                    "code_page" => {
                        let code_page = expect_number(&field, value)?;
                        let code_page = u32::try_from(code_page).map_err(|_| {
                            KickoffError::InvalidConfiguration(format!(
                                "code_page {} is out of range",
                                code_page
                            ))
                        })?;
                        plan.code_page = Some(code_page);
                    }
                    "hold" => plan.hold = expect_bool(&field, value)?,
                    "wait_for_key" => plan.wait_for_key = expect_bool(&field, value)?,
                    "terminal" => plan.terminal = Some(expect_string(&field, value)?),
                    _ => {
                        return Err(KickoffError::ParseError(format!(
                            "Unknown launcher field '{}'",
                            field
                        )))
                    }
                }
            }
            Rule::targets => {
                for target_pair in inner_pair.into_inner() {
                    if target_pair.as_rule() == Rule::target {
                        plan.targets.push(parse_target(target_pair)?);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(plan)
}

fn parse_target(pair: Pair<Rule>) -> Result<Target> {
    let mut title = None;
    let mut run = None;
    let mut target = Target::new("", "");

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::string_literal => {
                // The only bare string in a target block is its title
                title = Some(unescape_string(inner_pair)?);
            }
            Rule::setting => {
                let (field, value) = parse_setting(inner_pair)?;
                match field.as_str() {
                    "run" => run = Some(expect_string(&field, value)?),
                    "cwd" => target.cwd = Some(PathBuf::from(expect_string(&field, value)?)),
                    "delay" => target.delay = expect_duration(&field, value)?,
                    "ready_timeout" => target.ready_timeout = expect_duration(&field, value)?,
                    _ => {
                        return Err(KickoffError::ParseError(format!(
                            "Unknown target field '{}'",
                            field
                        )))
                    }
                }
            }
            Rule::readiness => {
                target.readiness = Some(parse_readiness(inner_pair)?);
            }
            Rule::env_block => {
                for var in inner_pair.into_inner() {
                    let mut parts = var.into_inner();
                    let key = parts.next().map(|p| p.as_str().to_string());
                    let value = parts.next().map(unescape_string).transpose()?;
                    if let (Some(key), Some(value)) = (key, value) {
                        target.env.push((key, value));
                    }
                }
            }
            _ => {}
        }
    }

    let title = title.unwrap_or_default();
    let run = run.ok_or_else(|| {
        KickoffError::InvalidConfiguration(format!("Target '{}' has no run command", title))
    })?;

    target.title = title;
    target.run = run;
    Ok(target)
}

fn parse_readiness(pair: Pair<Rule>) -> Result<Readiness> {
    let mut kind = None;
    let mut location = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::probe_kind => kind = Some(inner_pair.as_str().to_string()),
            Rule::string_literal => location = Some(unescape_string(inner_pair)?),
            _ => {}
        }
    }

    let location = location
        .filter(|l| !l.is_empty())
        .ok_or_else(|| KickoffError::InvalidConfiguration("Empty readiness target".to_string()))?;

    match kind.as_deref() {
        Some("http") => Ok(Readiness::Http(location)),
        Some("tcp") => Ok(Readiness::Tcp(location)),
        Some("file") => Ok(Readiness::File(PathBuf::from(location))),
        other => Err(KickoffError::ParseError(format!(
            "Unknown readiness probe {:?}",
            other
        ))),
    }
}

fn parse_setting(pair: Pair<Rule>) -> Result<(String, Value)> {
    let mut inner = pair.into_inner();

    let field = inner
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| KickoffError::ParseError("Setting without a name".to_string()))?;

    let value_pair = inner
        .next()
        .ok_or_else(|| KickoffError::ParseError(format!("Setting '{}' has no value", field)))?;

    let value = match value_pair.as_rule() {
        Rule::string_literal => Value::Str(unescape_string(value_pair)?),
        Rule::multiline_string => Value::Str(unquote_multiline_string(value_pair.as_str())),
        Rule::duration => Value::Duration(parse_duration(value_pair.as_str())?),
        Rule::number => Value::Number(value_pair.as_str().parse().map_err(|_| {
            KickoffError::ParseError(format!("Number too large for '{}'", field))
        })?),
        Rule::boolean => Value::Bool(value_pair.as_str() == "true"),
        rule => {
            return Err(KickoffError::ParseError(format!(
                "Unexpected value {:?} for '{}'",
                rule, field
            )))
        }
    };

    Ok((field, value))
}

/// Parse `250ms`, `3s` or `2m`
pub fn parse_duration(text: &str) -> Result<Duration> {
    let (digits, unit) = if let Some(d) = text.strip_suffix("ms") {
        (d, "ms")
    } else if let Some(d) = text.strip_suffix('s') {
        (d, "s")
    } else if let Some(d) = text.strip_suffix('m') {
        (d, "m")
    } else {
        return Err(KickoffError::ParseError(format!("Invalid duration '{}'", text)));
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| KickoffError::ParseError(format!("Invalid duration '{}'", text)))?;

    Ok(match unit {
        "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        _ => Duration::from_secs(amount.saturating_mul(60)),
    })
}

fn validate_plan(plan: &LaunchPlan) -> Result<()> {
    if plan.targets.is_empty() {
        return Err(KickoffError::InvalidConfiguration(
            "Launchfile declares no targets".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for target in &plan.targets {
        if target.title.trim().is_empty() {
            return Err(KickoffError::InvalidConfiguration(
                "Target title must not be empty".to_string(),
            ));
        }
        if target.run.trim().is_empty() {
            return Err(KickoffError::InvalidConfiguration(format!(
                "Target '{}' has an empty run command",
                target.title
            )));
        }
        if !seen.insert(target.title.as_str()) {
            return Err(KickoffError::InvalidConfiguration(format!(
                "Duplicate target title '{}'",
                target.title
            )));
        }
        if target.readiness.is_some() && target.ready_timeout.is_zero() {
            return Err(KickoffError::InvalidConfiguration(format!(
                "Target '{}' has a readiness probe with a zero ready_timeout",
                target.title
            )));
        }
    }

    Ok(())
}

fn expect_string(field: &str, value: Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(field, "string", &other)),
    }
}

fn expect_duration(field: &str, value: Value) -> Result<Duration> {
    match value {
        Value::Duration(d) => Ok(d),
        // A bare zero needs no unit
        Value::Number(0) => Ok(Duration::ZERO),
        other => Err(type_error(field, "duration", &other)),
    }
}

fn expect_number(field: &str, value: Value) -> Result<u64> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(type_error(field, "number", &other)),
    }
}

fn expect_bool(field: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(type_error(field, "boolean", &other)),
    }
}

fn type_error(field: &str, expected: &str, found: &Value) -> KickoffError {
    KickoffError::ParseError(format!(
        "Field '{}' expects a {}, found a {}",
        field,
        expected,
        found.kind()
    ))
}

fn unescape_string(pair: Pair<Rule>) -> Result<String> {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default();

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                // Unknown escapes stay literal so Windows paths survive
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn unquote_multiline_string(s: &str) -> String {
    s.trim()
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
        .unwrap_or(s)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LAUNCHFILE_TEMPLATE;
    use kickoff_core::DEFAULT_READY_TIMEOUT;

    #[test]
    fn test_parse_minimal_launchfile() {
        let input = r#"
launcher {
  targets {
    target "echo" {
      run: "echo hello";
    }
  }
}
"#;
        let plan = parse_launchfile(input).unwrap();
        assert_eq!(plan.name, "default");
        assert_eq!(plan.banner, DEFAULT_BANNER);
        assert!(plan.hold);
        assert!(plan.wait_for_key);
        assert_eq!(plan.code_page, None);
        assert_eq!(plan.targets.len(), 1);
        assert_eq!(plan.targets[0].title, "echo");
        assert_eq!(plan.targets[0].run, "echo hello");
        assert_eq!(plan.targets[0].delay, Duration::ZERO);
        assert_eq!(plan.targets[0].ready_timeout, DEFAULT_READY_TIMEOUT);
    }

    #[test]
    fn test_parse_full_launchfile() {
        let input = r#"
# Trading desk
launcher {
  name: "desk";
  banner: "Запуск компонентов";
  completion: "Done";
  code_page: 65001;
  hold: false;
  wait_for_key: false;
  terminal: "xterm";

  targets {
    target "Ticker Viewer" {
      run: """
        python run_ticker_viewer.py
      """;
      delay: 3s;
    }
    target "Trainer GUI" {
      run: "python trainer_gui.py";
      cwd: "gui";
      delay: 500ms;
      ready: tcp "127.0.0.1:8765";
      ready_timeout: 2m;
      env {
        PYTHONIOENCODING: "utf-8";
        MODE: "paper";
      }
    }
    target "Trading Bot" {
      run: "python trading_bot_main.py"; # trailing comment
      ready: http "http://127.0.0.1:9000/health";
    }
  }
}
"#;
        let plan = parse_launchfile(input).unwrap();
        assert_eq!(plan.name, "desk");
        assert_eq!(plan.banner, "Запуск компонентов");
        assert_eq!(plan.code_page, Some(65001));
        assert!(!plan.hold);
        assert!(!plan.wait_for_key);
        assert_eq!(plan.terminal.as_deref(), Some("xterm"));

        let viewer = &plan.targets[0];
        assert_eq!(viewer.run, "python run_ticker_viewer.py");
        assert_eq!(viewer.delay, Duration::from_secs(3));

        let gui = plan.target("Trainer GUI").unwrap();
        assert_eq!(gui.cwd, Some(PathBuf::from("gui")));
        assert_eq!(gui.delay, Duration::from_millis(500));
        assert_eq!(gui.readiness, Some(Readiness::Tcp("127.0.0.1:8765".to_string())));
        assert_eq!(gui.ready_timeout, Duration::from_secs(120));
        assert_eq!(
            gui.env,
            vec![
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
                ("MODE".to_string(), "paper".to_string()),
            ]
        );

        let bot = plan.target("Trading Bot").unwrap();
        assert_eq!(
            bot.readiness,
            Some(Readiness::Http("http://127.0.0.1:9000/health".to_string()))
        );
    }

    #[test]
    fn test_template_matches_default_plan() {
        let plan = parse_launchfile(LAUNCHFILE_TEMPLATE).unwrap();
        assert_eq!(plan, LaunchPlan::default());
    }

    #[test]
    fn test_string_escapes() {
        let input = r#"
launcher {
  banner: "say \"hi\"\tnow";
  targets {
    target "win" {
      run: "C:\Python\python.exe app.py";
      ready: file "C:\\tmp\\ready.flag";
    }
  }
}
"#;
        let plan = parse_launchfile(input).unwrap();
        assert_eq!(plan.banner, "say \"hi\"\tnow");
        assert_eq!(plan.targets[0].run, r"C:\Python\python.exe app.py");
        assert_eq!(
            plan.targets[0].readiness,
            Some(Readiness::File(PathBuf::from(r"C:\tmp\ready.flag")))
        );
    }

    #[test]
    fn test_zero_delay_without_unit() {
        let input = r#"
launcher {
  targets {
    target "a" { run: "a"; delay: 0; }
  }
}
"#;
        let plan = parse_launchfile(input).unwrap();
        assert_eq!(plan.targets[0].delay, Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("3h").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn test_missing_run_is_rejected() {
        let input = r#"
launcher {
  targets {
    target "broken" { delay: 1s; }
  }
}
"#;
        let err = parse_launchfile(input).unwrap_err();
        assert!(matches!(err, KickoffError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let input = r#"
launcher {
  colour: "blue";
  targets {
    target "a" { run: "a"; }
  }
}
"#;
        let err = parse_launchfile(input).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_wrong_value_type_is_rejected() {
        let input = r#"
launcher {
  targets {
    target "a" { run: "a"; delay: "soon"; }
  }
}
"#;
        let err = parse_launchfile(input).unwrap_err();
        assert!(err.to_string().contains("expects a duration"));
    }

    #[test]
    fn test_duplicate_titles_are_rejected() {
        let input = r#"
launcher {
  targets {
    target "a" { run: "one"; }
    target "a" { run: "two"; }
  }
}
"#;
        let err = parse_launchfile(input).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_empty_targets_are_rejected() {
        let input = r#"
launcher {
  name: "nothing";
  targets {
  }
}
"#;
        assert!(matches!(
            parse_launchfile(input),
            Err(KickoffError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_syntax_error() {
        let input = r#"launcher { targets { target "a" { run: "a" } } }"#;
        assert!(matches!(
            parse_launchfile(input),
            Err(KickoffError::ParseError(_))
        ));
    }
}
