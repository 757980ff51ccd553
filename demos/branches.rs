//! A branching topology: fan out, transform each branch, merge back.

use stagewire::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Branching Topology Example ===");

    let supervisor = Supervisor::new();
    let evens = IterSource::new(&supervisor, 0..10u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?;

    let mut branches = fan_out(evens, 2).into_iter();
    let (Some(first), Some(second)) = (branches.next(), branches.next()) else {
        return Err(Error::custom("fan_out returned too few branches"));
    };

    let labels = first.via(Map::new(
        &supervisor,
        |n: u64| async move { Ok(format!("Test-{n}")) },
        2,
    ))?;
    let doubled = second.via(FlatMap::new(
        &supervisor,
        |n: u64| async move { Ok(vec![n.to_string(), n.to_string()]) },
        2,
    ))?;

    let merged = merge([labels.into_feed(), doubled.into_feed()])?;
    merged.to(StdoutSink::new(&supervisor)).await?;

    supervisor.wait().await?;
    println!("Branching topology completed");
    Ok(())
}
