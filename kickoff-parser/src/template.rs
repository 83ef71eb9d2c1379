/// Launchfile written by `kickoff init`; parses to `LaunchPlan::default()`
pub const LAUNCHFILE_TEMPLATE: &str = r#"# Launchfile - kickoff launch plan
#
# Each target opens in its own terminal window, in the order listed.
# `delay` is the pause after a target is started, before the next one.

launcher {
  name: "trading-suite";
  banner: "Starting trading suite components";
  completion: "All components started";
  code_page: 65001;
  hold: true;
  wait_for_key: true;

  targets {
    target "Ticker Viewer" {
      run: "python run_ticker_viewer.py";
      delay: 3s;
    }

    target "Trainer GUI" {
      run: "python trainer_gui.py";
      delay: 3s;
      # ready: tcp "127.0.0.1:8765";
      # ready_timeout: 30s;
    }

    target "Trading Bot" {
      run: "python trading_bot_main.py";
      delay: 1s;
      # env {
      #   PYTHONIOENCODING: "utf-8";
      # }
    }
  }
}
"#;
