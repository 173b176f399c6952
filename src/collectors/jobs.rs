//! Per-instance health and vitals, per-process health and resource usage.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::GaugeVec;
use std::time::Instant;
use tracing::debug;

use super::{collect_error, parse_vital, MetricsContext, ScrapeTiming, SubCollector};
use crate::deployments::DeploymentInfo;
use crate::director::{DiskUsage, InstanceInfo, ProcessInfo};
use crate::error::Error;
use crate::filters::CollectorName;

const JOB_LABELS: &[&str] = &[
    "bosh_deployment",
    "bosh_job_name",
    "bosh_job_id",
    "bosh_job_index",
    "bosh_job_az",
    "bosh_job_ip",
];

const PROCESS_LABELS: &[&str] = &[
    "bosh_deployment",
    "bosh_job_name",
    "bosh_job_id",
    "bosh_job_index",
    "bosh_job_az",
    "bosh_job_ip",
    "bosh_job_process_name",
];

struct DiskGauges {
    percent: GaugeVec,
    inode_percent: GaugeVec,
}

impl DiskGauges {
    fn new(ctx: &MetricsContext, disk: &str) -> prometheus::Result<Self> {
        Ok(Self {
            percent: GaugeVec::new(
                ctx.opts(
                    &format!("job_{}_disk_percent", disk),
                    &format!("BOSH Job {} Disk Percent.", title(disk)),
                ),
                JOB_LABELS,
            )?,
            inode_percent: GaugeVec::new(
                ctx.opts(
                    &format!("job_{}_disk_inode_percent", disk),
                    &format!("BOSH Job {} Disk Inode Percent.", title(disk)),
                ),
                JOB_LABELS,
            )?,
        })
    }

    fn gauges(&self) -> [&GaugeVec; 2] {
        [&self.percent, &self.inode_percent]
    }
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn job_gauge(ctx: &MetricsContext, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    GaugeVec::new(ctx.opts(name, help), JOB_LABELS)
}

fn process_gauge(ctx: &MetricsContext, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    GaugeVec::new(ctx.opts(name, help), PROCESS_LABELS)
}

struct JobMetrics {
    healthy: GaugeVec,
    load_avg01: GaugeVec,
    load_avg05: GaugeVec,
    load_avg15: GaugeVec,
    cpu_sys: GaugeVec,
    cpu_user: GaugeVec,
    cpu_wait: GaugeVec,
    mem_kb: GaugeVec,
    mem_percent: GaugeVec,
    swap_kb: GaugeVec,
    swap_percent: GaugeVec,
    system_disk: DiskGauges,
    ephemeral_disk: DiskGauges,
    persistent_disk: DiskGauges,
    process_healthy: GaugeVec,
    process_uptime: GaugeVec,
    process_cpu_total: GaugeVec,
    process_mem_kb: GaugeVec,
    process_mem_percent: GaugeVec,
    timing: ScrapeTiming,
}

impl JobMetrics {
    fn new(ctx: &MetricsContext) -> prometheus::Result<Self> {
        Ok(Self {
            healthy: job_gauge(ctx, "job_healthy", "BOSH Job Healthy (1 for healthy, 0 for unhealthy).")?,
            load_avg01: job_gauge(ctx, "job_load_avg01", "BOSH Job Load avg01.")?,
            load_avg05: job_gauge(ctx, "job_load_avg05", "BOSH Job Load avg05.")?,
            load_avg15: job_gauge(ctx, "job_load_avg15", "BOSH Job Load avg15.")?,
            cpu_sys: job_gauge(ctx, "job_cpu_sys", "BOSH Job CPU System.")?,
            cpu_user: job_gauge(ctx, "job_cpu_user", "BOSH Job CPU User.")?,
            cpu_wait: job_gauge(ctx, "job_cpu_wait", "BOSH Job CPU Wait.")?,
            mem_kb: job_gauge(ctx, "job_mem_kb", "BOSH Job Memory KB.")?,
            mem_percent: job_gauge(ctx, "job_mem_percent", "BOSH Job Memory Percent.")?,
            swap_kb: job_gauge(ctx, "job_swap_kb", "BOSH Job Swap KB.")?,
            swap_percent: job_gauge(ctx, "job_swap_percent", "BOSH Job Swap Percent.")?,
            system_disk: DiskGauges::new(ctx, "system")?,
            ephemeral_disk: DiskGauges::new(ctx, "ephemeral")?,
            persistent_disk: DiskGauges::new(ctx, "persistent")?,
            process_healthy: process_gauge(
                ctx,
                "job_process_healthy",
                "BOSH Job Process Healthy (1 for healthy, 0 for unhealthy).",
            )?,
            process_uptime: process_gauge(
                ctx,
                "job_process_uptime_seconds",
                "BOSH Job Process Uptime in seconds.",
            )?,
            process_cpu_total: process_gauge(ctx, "job_process_cpu_total", "BOSH Job Process CPU Total.")?,
            process_mem_kb: process_gauge(ctx, "job_process_mem_kb", "BOSH Job Process Memory KB.")?,
            process_mem_percent: process_gauge(
                ctx,
                "job_process_mem_percent",
                "BOSH Job Process Memory Percent.",
            )?,
            timing: ScrapeTiming::new(ctx, "jobs", "job")?,
        })
    }

    fn gauges(&self) -> Vec<&GaugeVec> {
        let mut gauges = vec![
            &self.healthy,
            &self.load_avg01,
            &self.load_avg05,
            &self.load_avg15,
            &self.cpu_sys,
            &self.cpu_user,
            &self.cpu_wait,
            &self.mem_kb,
            &self.mem_percent,
            &self.swap_kb,
            &self.swap_percent,
        ];
        gauges.extend(self.system_disk.gauges());
        gauges.extend(self.ephemeral_disk.gauges());
        gauges.extend(self.persistent_disk.gauges());
        gauges.extend([
            &self.process_healthy,
            &self.process_uptime,
            &self.process_cpu_total,
            &self.process_mem_kb,
            &self.process_mem_percent,
        ]);
        gauges
    }

    fn desc(&self) -> Vec<&Desc> {
        let mut descs: Vec<&Desc> = self.gauges().into_iter().flat_map(|g| g.desc()).collect();
        descs.extend(self.timing.desc());
        descs
    }

    fn families(&self) -> Vec<MetricFamily> {
        let mut families: Vec<MetricFamily> =
            self.gauges().into_iter().flat_map(|g| g.collect()).collect();
        families.extend(self.timing.collect());
        families
    }

    fn record(&self, deployment: &str, instance: &InstanceInfo) {
        let index = instance.index_label();
        let ip = instance.ips.first().map(String::as_str).unwrap_or("");
        let labels = [
            deployment,
            instance.job_name.as_str(),
            instance.id.as_str(),
            index.as_str(),
            instance.az(),
            ip,
        ];

        self.healthy
            .with_label_values(&labels)
            .set(if instance.is_running() { 1.0 } else { 0.0 });

        let vitals = &instance.vitals;
        let load = |i: usize| vitals.load.get(i).map(String::as_str).unwrap_or("");
        self.set_vital(&self.load_avg01, &labels, "load avg01", load(0));
        self.set_vital(&self.load_avg05, &labels, "load avg05", load(1));
        self.set_vital(&self.load_avg15, &labels, "load avg15", load(2));
        self.set_vital(&self.cpu_sys, &labels, "cpu sys", &vitals.cpu.sys);
        self.set_vital(&self.cpu_user, &labels, "cpu user", &vitals.cpu.user);
        self.set_vital(&self.cpu_wait, &labels, "cpu wait", &vitals.cpu.wait);
        self.set_vital(&self.mem_kb, &labels, "mem kb", &vitals.mem.kb);
        self.set_vital(&self.mem_percent, &labels, "mem percent", &vitals.mem.percent);
        self.set_vital(&self.swap_kb, &labels, "swap kb", &vitals.swap.kb);
        self.set_vital(&self.swap_percent, &labels, "swap percent", &vitals.swap.percent);

        self.set_disk(&self.system_disk, &labels, "system", vitals.disk.system.as_ref());
        self.set_disk(&self.ephemeral_disk, &labels, "ephemeral", vitals.disk.ephemeral.as_ref());
        self.set_disk(&self.persistent_disk, &labels, "persistent", vitals.disk.persistent.as_ref());

        for process in &instance.processes {
            self.record_process(&labels, process);
        }
    }

    fn record_process(&self, job_labels: &[&str; 6], process: &ProcessInfo) {
        let [deployment, job, id, index, az, ip] = *job_labels;
        let labels = [deployment, job, id, index, az, ip, process.name.as_str()];

        self.process_healthy
            .with_label_values(&labels)
            .set(if process.is_running() { 1.0 } else { 0.0 });
        if let Some(secs) = process.uptime.secs {
            self.process_uptime.with_label_values(&labels).set(secs as f64);
        }
        self.process_cpu_total
            .with_label_values(&labels)
            .set(process.cpu.total);
        self.process_mem_kb
            .with_label_values(&labels)
            .set(process.mem.kb as f64);
        self.process_mem_percent
            .with_label_values(&labels)
            .set(process.mem.percent);
    }

    fn set_disk(&self, gauges: &DiskGauges, labels: &[&str; 6], disk: &str, usage: Option<&DiskUsage>) {
        let Some(usage) = usage else {
            return;
        };
        self.set_vital(&gauges.percent, labels, &format!("{} disk percent", disk), &usage.percent);
        self.set_vital(
            &gauges.inode_percent,
            labels,
            &format!("{} disk inode percent", disk),
            &usage.inode_percent,
        );
    }

    fn set_vital(&self, gauge: &GaugeVec, labels: &[&str; 6], vital: &str, raw: &str) {
        match parse_vital(raw) {
            Some(v) => gauge.with_label_values(labels).set(v),
            None => debug!(
                "Skipping {} of job `{}/{}` in deployment `{}`: unparsable value {:?}",
                vital, labels[1], labels[2], labels[0], raw
            ),
        }
    }
}

/// Emits `job_*` and `job_process_*` gauges for every instance.
pub struct JobsCollector {
    ctx: MetricsContext,
    template: JobMetrics,
}

impl JobsCollector {
    pub fn new(ctx: MetricsContext) -> Result<Self, Error> {
        let template = JobMetrics::new(&ctx).map_err(|e| collect_error(CollectorName::Jobs, e))?;
        Ok(Self { ctx, template })
    }
}

impl SubCollector for JobsCollector {
    fn name(&self) -> CollectorName {
        CollectorName::Jobs
    }

    fn desc(&self) -> Vec<&Desc> {
        self.template.desc()
    }

    fn collect(&self, deployments: &[DeploymentInfo]) -> Result<Vec<MetricFamily>, Error> {
        let started = Instant::now();
        let metrics = JobMetrics::new(&self.ctx).map_err(|e| collect_error(self.name(), e))?;

        for deployment in deployments {
            for instance in &deployment.instances {
                metrics.record(&deployment.name, instance);
            }
        }

        metrics.timing.finish(started);
        Ok(metrics.families())
    }
}
