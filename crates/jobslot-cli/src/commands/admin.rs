//! Operator commands: clear, ignore, purge, drop.

use anyhow::Result;

use super::{Context, FilterArgs, JobArgs};

pub async fn clear(ctx: &Context, args: &JobArgs) -> Result<()> {
    let key = args.key()?;
    let removed = ctx.store().await?.clear(&args.work_unit, &key).await?;
    println!("{}", if removed { "cleared" } else { "nothing to clear" });
    Ok(())
}

pub async fn ignore(ctx: &Context, args: &JobArgs) -> Result<()> {
    let key = args.key()?;
    ctx.store().await?.ignore(&args.work_unit, &key).await?;
    Ok(())
}

pub async fn purge(ctx: &Context, args: &FilterArgs) -> Result<()> {
    let removed = ctx.store().await?.purge(&args.filter()).await?;
    println!("purged {removed} record(s)");
    Ok(())
}

pub async fn drop_table(ctx: &Context) -> Result<()> {
    ctx.store().await?.drop_table().await?;
    println!("dropped job table of '{}'", ctx.namespace);
    Ok(())
}
