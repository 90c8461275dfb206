// End-to-end attribution through the public API: instrument, finish,
// persist, reload and compare.

use std::collections::HashMap;
use tempfile::TempDir;
use vatio::backend::{select, BackendSettings, EnergyBackend, Measurement, MockBackend};
use vatio::compare::compare;
use vatio::filter::IgnoreFilter;
use vatio::results::ProfileResults;
use vatio::tracer::{CallSite, EnergyTracer, Granularity, Instrument};
use vatio::{call_site, ProfileError};

fn fib<B: EnergyBackend>(tracer: &mut EnergyTracer<B>, n: u32) -> u64 {
    tracer.measure(&CallSite::new("src/math.rs", "fib"), |t| {
        if n < 2 {
            u64::from(n)
        } else {
            fib(t, n - 1) + fib(t, n - 2)
        }
    })
}

#[test]
fn test_recursive_attribution() {
    let mut tracer = EnergyTracer::new(MockBackend::new(1.0));
    assert_eq!(fib(&mut tracer, 10), 55);

    let results = tracer.finish();
    // fib(10) makes 177 calls
    let f = results.function("src/math.rs:fib").unwrap();
    assert_eq!(f.calls, 177);
    assert_eq!(f.total_energy_mj, 177.0);
}

#[test]
fn test_pipeline_save_load_compare() {
    let dir = TempDir::new().unwrap();

    let run = |work: u32| {
        let mut tracer = EnergyTracer::new(MockBackend::new(2.0));
        tracer.measure(&call_site!("main"), |t| {
            for _ in 0..work {
                t.measure(&call_site!("step"), |_| ());
            }
        });
        tracer.finish()
    };

    let baseline = dir.path().join("baseline.json");
    let candidate = dir.path().join("candidate.json");
    run(10).save(&baseline).unwrap();
    run(20).save(&candidate).unwrap();

    let old = ProfileResults::load(&baseline).unwrap();
    let new = ProfileResults::load(&candidate).unwrap();
    let comparison = compare(&old, &new);

    let step_key = call_site!("step").key();
    assert_eq!(comparison.changes[&step_key].change_percent, 100.0);
    assert_eq!(comparison.regressions, vec![step_key]);
    assert_eq!(old.function(&call_site!("main").key()).unwrap().calls, 1);
}

#[test]
fn test_ignore_patterns_through_instrument_trait() {
    let filter = IgnoreFilter::from_patterns(["*/generated/*"]).unwrap();
    let mut tracer = EnergyTracer::new(MockBackend::new(1.0)).with_filter(filter);

    {
        let inst: &mut dyn Instrument = &mut tracer;
        inst.on_call(&CallSite::new("src/app.rs", "handler"));
        inst.on_call(&CallSite::new("src/generated/bindings.rs", "ffi_shim"));
        inst.on_call(&CallSite::new("src/app.rs", "callback"));
        inst.on_return();
        inst.on_return();
        inst.on_return();
        inst.on_return(); // stray
    }

    let results = tracer.finish();
    assert_eq!(results.summary.function_count, 2);
    assert!(results.function("src/app.rs:handler").is_some());
    assert!(results.function("src/app.rs:callback").is_some());
    assert!(results.function("src/generated/bindings.rs:ffi_shim").is_none());
}

#[test]
fn test_line_level_results_flagged() {
    let mut tracer =
        EnergyTracer::new(MockBackend::new(1.0)).with_granularity(Granularity::Line);
    tracer.measure(&call_site!("loop_body"), |t| {
        for _ in 0..4 {
            t.line();
        }
    });

    let results = tracer.finish();
    assert!(results.metadata.line_level);
    assert_eq!(results.function(&call_site!("loop_body").key()).unwrap().calls, 5);
}

#[test]
fn test_partial_run_is_drained() {
    let mut tracer = EnergyTracer::new(MockBackend::new(3.0));
    tracer.enter(&call_site!("main"));
    tracer.enter(&call_site!("worker"));
    // run aborted here

    let results = tracer.finish();
    assert_eq!(results.summary.function_count, 2);
    assert_eq!(results.summary.total_energy_mj, 6.0);
}

/// Backend that fails every other stop()
struct Flaky {
    inner: MockBackend,
    stops: u32,
}

impl EnergyBackend for Flaky {
    fn start(&mut self) -> vatio::Result<()> {
        self.inner.start()
    }

    fn stop(&mut self) -> vatio::Result<Measurement> {
        self.stops += 1;
        let m = self.inner.stop()?;
        if self.stops % 2 == 0 {
            return Err(ProfileError::Measurement {
                backend: "flaky",
                reason: "sensor busy".to_string(),
            });
        }
        Ok(m)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[test]
fn test_flaky_backend_never_unbalances_stack() {
    let mut tracer = EnergyTracer::new(Flaky {
        inner: MockBackend::new(1.0),
        stops: 0,
    });
    for _ in 0..10 {
        tracer.measure(&call_site!("op"), |_| ());
    }

    assert_eq!(tracer.depth(), 0);
    assert_eq!(tracer.dropped_measurements(), 5);
    let results = tracer.finish();
    assert_eq!(results.function(&call_site!("op").key()).unwrap().calls, 5);
    assert_eq!(results.metadata.backend, "flaky");
}

#[test]
fn test_registry_backend_drives_tracer() {
    let backend = select("mock", &BackendSettings::default()).unwrap();
    let mut tracer: EnergyTracer = EnergyTracer::new(backend);
    tracer.measure(&call_site!("main"), |_| ());

    let results = tracer.finish();
    assert_eq!(results.summary.total_energy_mj, 10.0);
}

#[test]
fn test_stats_keys_match_results() {
    let mut tracer = EnergyTracer::new(MockBackend::new(1.0));
    tracer.measure(&CallSite::new("a.rs", "x"), |t| {
        t.measure(&CallSite::new("b.rs", "y"), |_| ());
    });

    let keys: HashMap<_, _> = tracer
        .stats()
        .iter()
        .map(|(k, s)| (k.clone(), s.calls))
        .collect();
    let results = tracer.results();
    for (key, calls) in keys {
        assert_eq!(results.function(&key).unwrap().calls, calls);
    }
}
