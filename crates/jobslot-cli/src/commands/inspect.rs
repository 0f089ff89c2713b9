//! Read-only commands: status, list, counts.

use anyhow::Result;
use jobslot_core::JobRecord;

use super::{Context, FilterArgs, JobArgs};
use crate::OutputFormat;

pub async fn status(ctx: &Context, args: &JobArgs) -> Result<()> {
    let key = args.key()?;
    let record = ctx.store().await?.get(&args.work_unit, &key).await?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => match record {
            Some(record) => print_record(&record),
            None => println!("available"),
        },
    }
    Ok(())
}

pub async fn list(ctx: &Context, args: &FilterArgs) -> Result<()> {
    let records = ctx.store().await?.list(&args.filter()).await?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No job records");
                return Ok(());
            }
            for record in &records {
                print_record(record);
            }
        }
    }
    Ok(())
}

pub async fn counts(ctx: &Context) -> Result<()> {
    let counts = ctx.store().await?.counts().await?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
        OutputFormat::Text => println!(
            "reserved={} error={} ignore={}",
            counts.reserved, counts.error, counts.ignore
        ),
    }
    Ok(())
}

fn print_record(record: &JobRecord) {
    println!(
        "{} {} {:<8} {}:{} {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.work_unit,
        record.status,
        record.host,
        record.pid,
        record.key_hash,
    );
    if let Some(key) = &record.key {
        println!("    key: {key}");
    }
    if !record.error_message.is_empty() {
        println!("    error: {}", record.error_message);
    }
}
