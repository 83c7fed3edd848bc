use super::Context;
use crate::ui;
use wte_provision::StepOutcome;

pub async fn run(ctx: Context, force: bool, keep_creds: bool) -> anyhow::Result<()> {
    if !force {
        ui::warning("This removes GOST, its configuration, certificates and the service");
        if !ui::confirm("Continue with uninstall?")? {
            ui::info("Uninstall cancelled");
            return Ok(());
        }
    }

    ui::header("Uninstalling GOST proxy server");
    let report = ctx.provisioner.uninstall(&ctx.cfg, keep_creds).await;

    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Done => ui::success(step.name),
            StepOutcome::NotFound | StepOutcome::Skipped => {
                ui::info(format!("{} ({})", step.name, step.outcome))
            }
            StepOutcome::Failed(reason) => ui::warning(format!("{}: {}", step.name, reason)),
        }
    }

    let failures = report.failures().count();
    if failures == 0 {
        ui::success("Uninstall complete");
    } else {
        ui::warning(format!("Uninstall finished with {} failed step(s)", failures));
    }
    if keep_creds {
        ui::detail(
            "Credentials kept",
            ctx.provisioner.credentials_file().display().to_string(),
        );
    }
    Ok(())
}
