//! Diesel schema for job persistence.

diesel::table! {
    /// Review and report jobs.
    jobs (id) {
        /// Job identifier.
        id -> Uuid,
        /// Job kind.
        #[max_length = 20]
        kind -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Explicit retry counter.
        retry_count -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Start of the current run.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp for completed or failed jobs.
        completed_at -> Nullable<Timestamptz>,
        /// Failure summary.
        error_message -> Nullable<Text>,
        /// Progress cursor.
        current_unit_index -> Int4,
        /// Number of units in the pipeline.
        total_units -> Int4,
        /// Git hosting provider name.
        #[max_length = 50]
        provider -> Varchar,
        /// Repository URL.
        repository_url -> Text,
        /// Branch, tag or commit reference.
        #[max_length = 255]
        git_ref -> Varchar,
        /// Trigger source.
        #[max_length = 20]
        source -> Varchar,
        /// Kind-specific payload.
        details -> Jsonb,
        /// Reviewed pull request URL.
        pr_url -> Nullable<Text>,
        /// Reviewed commit.
        #[max_length = 64]
        commit_sha -> Nullable<Varchar>,
        /// Pull request revision counter.
        revision_count -> Int4,
        /// Merge or close time of the reviewed pull request.
        merged_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Ordered units of a job's pipeline.
    job_units (id) {
        /// Unit identifier.
        id -> Uuid,
        /// Owning job.
        job_id -> Uuid,
        /// Zero-based position in the pipeline.
        ordinal -> Int4,
        /// Rule or section name.
        #[max_length = 255]
        name -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Number of times the unit re-entered `running`.
        retry_count -> Int4,
        /// Failure message of the last attempt.
        error_message -> Nullable<Text>,
        /// Result of the latest successful attempt.
        result -> Nullable<Jsonb>,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only execution records of units.
    unit_attempts (id) {
        /// Attempt identifier.
        id -> Uuid,
        /// Executed unit.
        unit_id -> Uuid,
        /// One-based attempt number.
        number -> Int4,
        /// Execution start.
        started_at -> Timestamptz,
        /// Execution end.
        finished_at -> Timestamptz,
        /// Outcome payload.
        outcome -> Jsonb,
        /// SHA-256 digest of the raw agent output.
        #[max_length = 64]
        output_digest -> Nullable<Varchar>,
    }
}

diesel::joinable!(job_units -> jobs (job_id));
diesel::joinable!(unit_attempts -> job_units (unit_id));
diesel::allow_tables_to_appear_in_same_query!(jobs, job_units, unit_attempts);
