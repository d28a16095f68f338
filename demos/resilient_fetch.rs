//! 弹性调用示例
//!
//! 本示例演示熔断器、重试与降级的组合使用。
//!
//! 运行方式: `cargo run --example resilient_fetch`

use cacheron::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// 模拟一个前两次调用失败的上游服务
async fn fetch_price(calls: &AtomicU32, sku: &str) -> Result<u64, CacheError> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    if n < 2 {
        println!("  上游调用 #{} 失败", n + 1);
        return Err(CacheError::backend_unavailable("pricing service unreachable"));
    }
    println!("  上游调用 #{} 成功", n + 1);
    Ok(sku.len() as u64 * 100)
}

#[tokio::main]
async fn main() {
    println!("=== 弹性调用示例 ===\n");

    let breaker = CircuitBreaker::new(
        "pricing",
        CircuitBreakerConfig::new(2, Duration::from_secs(1)),
    );
    let retry = RetryExecutor::new(RetryConfig::new(3, Duration::from_millis(50), 2.0));
    let fallback = FallbackExecutor::<u64, String>::new()
        .value_for(ErrorKind::CircuitOpen, 0)
        .on(ErrorKind::Storage, |err, sku| {
            println!("  降级: {} ({})", sku, err);
            1
        });

    println!("--- 重试直到恢复 ---\n");
    let calls = AtomicU32::new(0);
    let sku = "sku-42".to_string();
    let price = fallback
        .execute(
            || breaker.execute(|| retry.execute_transient(|| fetch_price(&calls, &sku))),
            &sku,
        )
        .await;
    println!("  价格: {:?}", price);
    println!("  重试统计: {:?}", retry.stats());

    println!("\n--- 熔断 ---\n");
    for _ in 0..3 {
        let result = fallback
            .execute(
                || {
                    breaker.execute(|| async {
                        Err::<u64, _>(CacheError::Storage(StorageError::Timeout("slow".into())))
                    })
                },
                &sku,
            )
            .await;
        println!("  结果: {:?}, 熔断器状态: {}", result, breaker.state());
    }

    println!("\n--- 等待恢复 ---\n");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let result = breaker.execute(|| async { Ok::<_, CacheError>(7) }).await;
    println!("  结果: {:?}, 熔断器状态: {}", result, breaker.state());
    println!("  统计: {:?}", breaker.get_stats());

    println!("\n=== 示例完成 ===");
}
