mod job_monitor;
