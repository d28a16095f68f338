//! 分层缓存示例
//!
//! 本示例演示两层缓存（内存 + 文件）的读写、提升与读穿透。
//!
//! 运行方式: `cargo run --example tiered_cache`

use cacheron::prelude::*;
use cacheron::FileStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), CacheError> {
    println!("=== 分层缓存示例 ===\n");

    let dir = std::env::temp_dir().join("cacheron-demo");
    let memory = Arc::new(MemoryStore::new(1000));
    let disk = Arc::new(FileStore::new(&dir).await?);

    let manager = TieredCacheManager::new()
        .with_promotion_mode(PromotionMode::Inline)
        .with_default_ttl(Duration::from_secs(300));
    manager.add_layer("memory", memory.clone(), 10);
    manager.add_layer("disk", disk, 1);

    println!("--- 写入磁盘层 ---\n");
    let report = manager.set("greeting", "hello", None, Some(&["disk"])).await;
    println!("  写入结果: 成功={}, 失败层={:?}", report.is_success(), report.failed_layers());
    println!("  memory 中存在: {}", memory.has("greeting").await?);

    println!("\n--- 分层读取（触发提升） ---\n");
    let value = manager.get("greeting").await?;
    println!("  get(greeting) = {:?}", value);
    println!("  memory 中存在: {}", memory.has("greeting").await?);

    println!("\n--- 读穿透 ---\n");
    for round in 1..=2 {
        let value = manager
            .remember("report", None, || async {
                println!("  (从上游加载)");
                Ok("expensive result".to_string())
            })
            .await?;
        println!("  第{}次: {}", round, value);
    }

    println!("\n--- 统计 ---\n");
    let stats = manager.manager_stats();
    println!("  查询次数: {}", stats.lookups);
    println!("  各层命中: {:?}", stats.hits);
    println!("  提升次数: {}", stats.promotions);
    println!("  命中率: {:.2}", stats.hit_rate());

    manager.clear(None).await;
    println!("\n=== 示例完成 ===");
    Ok(())
}
