use ixa_crossborder::log::info;
use ixa_crossborder::{run_with_args, ContextScenarioExt, IxaError};

fn main() {
    let result = run_with_args(|context, args, _| {
        if args.config.is_empty() {
            return Err(IxaError::config("a scenario config is required (--config)"));
        }
        let cross_layers = context.setup_scenario()?;
        context.run_scenario()?;

        let report = context.scenario_report(cross_layers);
        info!(
            "day {}: {} departures, {} returns, {} away",
            report.day, report.travel.departures, report.travel.returns, report.travel.away
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("crossborder: {e}");
        std::process::exit(1);
    }
}
